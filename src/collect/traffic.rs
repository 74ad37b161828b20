use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use reqwest::blocking::Client;
use serde_json::Value;
use sysinfo::Networks;
use tracing::info;

use crate::collect::prometheus::PrometheusClient;
use crate::collect::rate::ByteCounters;
use crate::config::dashboard_config::{CounterSourceConfig, Evaluate, NetworkFilter};
use crate::constants::ROUTER_TRAFFIC_PATH;

/// Anything that can report cumulative byte counters for the rate calculator.
pub trait CounterSource {
    fn read(&mut self) -> anyhow::Result<ByteCounters>;
}

/// Credentials and address coming from the environment rather than the layout file.
#[derive(Debug, Clone, Default)]
pub struct RouterOverrides {
    pub address: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
}

pub fn open_counter_source(
    config: &CounterSourceConfig,
    prometheus: Option<&PrometheusClient>,
    overrides: &RouterOverrides,
    timeout: Duration,
) -> anyhow::Result<Box<dyn CounterSource>> {
    match config {
        CounterSourceConfig::Prometheus {
            received,
            transmitted,
        } => {
            let client = prometheus
                .cloned()
                .ok_or_else(|| anyhow!("Prometheus counters need a Prometheus URL"))?;
            Ok(Box::new(PrometheusCounters {
                client,
                received: received.clone(),
                transmitted: transmitted.clone(),
            }))
        }
        CounterSourceConfig::Router {
            address,
            key,
            secret,
            interface,
            accept_invalid_certs,
        } => {
            let address = overrides
                .address
                .clone()
                .or_else(|| address.clone())
                .ok_or_else(|| anyhow!("Router address is not configured (OPNS_IP_ADDR)"))?;
            let key = overrides
                .key
                .clone()
                .or_else(|| key.clone())
                .ok_or_else(|| anyhow!("Router API key is not configured (OPNS_API_KEY)"))?;
            let secret = overrides.secret.clone().or_else(|| secret.clone()).ok_or_else(|| {
                anyhow!("Router API secret is not configured (OPNS_API_SECRET)")
            })?;

            Ok(Box::new(RouterCounters::new(
                &address,
                key,
                secret,
                interface.clone(),
                *accept_invalid_certs,
                timeout,
            )?))
        }
        CounterSourceConfig::Interface { interfaces } => {
            Ok(Box::new(InterfaceCounters::new(interfaces.clone())))
        }
    }
}

pub struct PrometheusCounters {
    client: PrometheusClient,
    received: String,
    transmitted: String,
}

impl CounterSource for PrometheusCounters {
    fn read(&mut self) -> anyhow::Result<ByteCounters> {
        let received = self
            .client
            .query_value(&self.received)
            .with_context(|| format!("query {}", self.received))?;
        let transmitted = self
            .client
            .query_value(&self.transmitted)
            .with_context(|| format!("query {}", self.transmitted))?;

        Ok(ByteCounters {
            received: received.max(0.0) as u64,
            transmitted: transmitted.max(0.0) as u64,
        })
    }
}

pub struct RouterCounters {
    client: Client,
    url: String,
    key: String,
    secret: String,
    interface: String,
}

impl RouterCounters {
    pub fn new(
        address: &str,
        key: String,
        secret: String,
        interface: String,
        accept_invalid_certs: bool,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to build the router HTTP client")?;

        let base = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", address.trim_end_matches('/'))
        };
        let url = format!("{base}{ROUTER_TRAFFIC_PATH}");
        info!(%url, %interface, "Reading interface counters from router");

        Ok(Self {
            client,
            url,
            key,
            secret,
            interface,
        })
    }
}

impl CounterSource for RouterCounters {
    fn read(&mut self) -> anyhow::Result<ByteCounters> {
        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.key, Some(&self.secret))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            bail!("Router answered {status}");
        }

        let body: Value = response.json()?;
        parse_router_counters(&body, &self.interface)
    }
}

/// Reads `interfaces.<name>["bytes received" | "bytes transmitted"]`.
pub fn parse_router_counters(body: &Value, interface: &str) -> anyhow::Result<ByteCounters> {
    let stats = body
        .get("interfaces")
        .and_then(|interfaces| interfaces.get(interface))
        .ok_or_else(|| anyhow!("Interface {interface:?} missing from router response"))?;

    Ok(ByteCounters {
        received: counter(stats, "bytes received")?,
        transmitted: counter(stats, "bytes transmitted")?,
    })
}

fn counter(stats: &Value, key: &str) -> anyhow::Result<u64> {
    match stats.get(key) {
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key:?} is not a counter: {raw:?}")),
        Some(Value::Number(number)) => number
            .as_u64()
            .ok_or_else(|| anyhow!("{key:?} is not a counter: {number}")),
        Some(other) => bail!("{key:?} is not a counter: {other}"),
        None => bail!("{key:?} missing from router response"),
    }
}

#[derive(Debug)]
pub struct InterfaceCounters {
    networks: Networks,
    filters: Vec<NetworkFilter>,
}

impl InterfaceCounters {
    pub fn new(filters: Vec<NetworkFilter>) -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            filters,
        }
    }
}

impl CounterSource for InterfaceCounters {
    fn read(&mut self) -> anyhow::Result<ByteCounters> {
        self.networks.refresh_list();

        let mut count = 0;
        let mut counters = ByteCounters::default();

        self.networks
            .iter()
            .filter(|(name, network_data)| {
                self.filters
                    .iter()
                    .any(|iface| iface.evaluate(&(*name, *network_data)))
            })
            .for_each(|(_, network_data)| {
                counters.received += network_data.total_received();
                counters.transmitted += network_data.total_transmitted();
                count += 1;
            });

        if count == 0 {
            bail!("No network interface matches {:?}", self.filters);
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::prometheus::tests::serve_once;
    use serde_json::json;

    #[test]
    fn test_parse_router_counters() {
        let body = json!({
            "interfaces": {
                "wan": { "bytes received": "123456", "bytes transmitted": 789 },
                "lan": { "bytes received": "1", "bytes transmitted": "2" }
            },
            "time": 1712345678.5
        });

        let wan = parse_router_counters(&body, "wan").unwrap();
        assert_eq!(
            wan,
            ByteCounters {
                received: 123456,
                transmitted: 789
            }
        );
        assert!(parse_router_counters(&body, "opt1").is_err());

        let broken = json!({ "interfaces": { "wan": { "bytes received": "lots" } } });
        assert!(parse_router_counters(&broken, "wan").is_err());
    }

    #[test]
    fn test_router_over_http() {
        let body = r#"{"interfaces":{"wan":{"bytes received":"2048","bytes transmitted":"1024"}}}"#;
        let (base_url, request) = serve_once("200 OK", body);

        let mut source = RouterCounters::new(
            &base_url,
            "key".to_string(),
            "secret".to_string(),
            "wan".to_string(),
            true,
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(
            source.read().unwrap(),
            ByteCounters {
                received: 2048,
                transmitted: 1024
            }
        );
        assert_eq!(
            request.recv().unwrap(),
            "GET /api/diagnostics/traffic/interface HTTP/1.1"
        );
    }

    #[test]
    fn test_router_error_status() {
        let (base_url, _request) = serve_once("401 Unauthorized", "{}");
        let mut source = RouterCounters::new(
            &base_url,
            "key".to_string(),
            "wrong".to_string(),
            "wan".to_string(),
            true,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(source.read().is_err());
    }

    #[test]
    fn test_prometheus_counters() {
        let (base_url, _request) = serve_once("200 OK", r#"{"data":{"result":[]}}"#);
        let client = PrometheusClient::new(&base_url, Duration::from_secs(2)).unwrap();
        let config = CounterSourceConfig::Prometheus {
            received: "node_network_receive_bytes_total".to_string(),
            transmitted: "node_network_transmit_bytes_total".to_string(),
        };
        let mut source =
            open_counter_source(&config, Some(&client), &RouterOverrides::default(), Duration::from_secs(2))
                .unwrap();
        assert!(source.read().is_err());
    }

    #[test]
    fn test_router_requires_credentials() {
        let config = CounterSourceConfig::Router {
            address: Some("192.168.1.1".to_string()),
            key: None,
            secret: None,
            interface: "wan".to_string(),
            accept_invalid_certs: true,
        };
        let timeout = Duration::from_secs(1);
        assert!(open_counter_source(&config, None, &RouterOverrides::default(), timeout).is_err());

        let overrides = RouterOverrides {
            address: None,
            key: Some("key".to_string()),
            secret: Some("secret".to_string()),
        };
        assert!(open_counter_source(&config, None, &overrides, timeout).is_ok());
    }

    #[test]
    fn test_unmatched_interface() {
        let mut source = InterfaceCounters::new(vec![NetworkFilter::Name(
            crate::config::dashboard_config::Predicate::Equal("no-such-iface0".to_string()),
        )]);
        assert!(source.read().is_err());
    }
}

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::collect::sample::MetricSample;
use crate::collect::MetricFetcher;
use crate::constants::PROMETHEUS_QUERY_PATH;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("expected exactly one result row, got {0}")]
    RowCount(usize),
    #[error("value {0:?} is not a number")]
    NotNumeric(String),
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    result: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    /// `[<unix timestamp>, "<value>"]`
    value: (serde_json::Value, String),
}

/// Extracts the single scalar of an instant-query response.
pub fn parse_response(status: StatusCode, body: &str) -> Result<f64, FetchError> {
    if status != StatusCode::OK {
        return Err(FetchError::Status(status));
    }

    let response: QueryResponse = serde_json::from_str(body)?;
    let [row] = response.data.result.as_slice() else {
        return Err(FetchError::RowCount(response.data.result.len()));
    };

    let raw = row.value.1.trim();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FetchError::NotNumeric(raw.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    query_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the Prometheus HTTP client")?;
        let query_url = format!("{}{PROMETHEUS_QUERY_PATH}", base_url.trim_end_matches('/'));
        debug!(%query_url, ?timeout, "Prometheus client ready");

        Ok(Self { client, query_url })
    }

    pub fn query_value(&self, query: &str) -> Result<f64, FetchError> {
        let response = self
            .client
            .get(&self.query_url)
            .query(&[("query", query)])
            .send()?;
        let status = response.status();
        let body = response.text()?;
        parse_response(status, &body)
    }
}

impl MetricFetcher for PrometheusClient {
    fn fetch(&mut self, query: &str) -> MetricSample {
        match self.query_value(query) {
            Ok(value) => MetricSample::Value(value),
            Err(err) => {
                warn!(query, %err, "Failed to fetch metric");
                MetricSample::Error
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// Serves one canned HTTP response per connection, in order, and hands back
    /// each request line.
    pub(crate) fn serve(responses: &[(&str, &str)]) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let responses: Vec<String> = responses
            .iter()
            .map(|(status, body)| {
                format!(
                    "HTTP/1.1 {status}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                )
            })
            .collect();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 4096];
                let read = stream.read(&mut buf).unwrap();
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let request_line = request.lines().next().unwrap_or_default().to_string();
                stream.write_all(response.as_bytes()).unwrap();
                let _ = tx.send(request_line);
            }
        });

        (base_url, rx)
    }

    pub(crate) fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        serve(&[(status, body)])
    }

    const OFFICE: &str = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"room":"Office"},"value":[0,"21.4"]}]}}"#;

    #[test]
    fn test_parse_single_row() {
        assert_eq!(parse_response(StatusCode::OK, OFFICE).unwrap(), 21.4);
        let body = r#"{"data":{"result":[{"value":[1712345678.123,"-3"]}]}}"#;
        assert_eq!(parse_response(StatusCode::OK, body).unwrap(), -3.0);
    }

    #[test]
    fn test_parse_row_count_errors() {
        let empty = r#"{"data":{"result":[]}}"#;
        assert!(matches!(
            parse_response(StatusCode::OK, empty),
            Err(FetchError::RowCount(0))
        ));

        let two = r#"{"data":{"result":[{"value":[0,"1"]},{"value":[0,"2"]}]}}"#;
        assert!(matches!(
            parse_response(StatusCode::OK, two),
            Err(FetchError::RowCount(2))
        ));
    }

    #[test]
    fn test_parse_other_errors() {
        assert!(matches!(
            parse_response(StatusCode::SERVICE_UNAVAILABLE, OFFICE),
            Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE))
        ));
        assert!(matches!(
            parse_response(StatusCode::OK, "<html>"),
            Err(FetchError::Decode(_))
        ));
        let text = r#"{"data":{"result":[{"value":[0,"warm"]}]}}"#;
        assert!(matches!(
            parse_response(StatusCode::OK, text),
            Err(FetchError::NotNumeric(v)) if v == "warm"
        ));
        let nan = r#"{"data":{"result":[{"value":[0,"NaN"]}]}}"#;
        assert!(matches!(
            parse_response(StatusCode::OK, nan),
            Err(FetchError::NotNumeric(_))
        ));
    }

    #[test]
    fn test_fetch_over_http() {
        let (base_url, request) = serve_once("200 OK", OFFICE);
        let mut client = PrometheusClient::new(&base_url, Duration::from_secs(2)).unwrap();

        let sample = client.fetch("thermometer_temperature_celsius{room='Office'}");
        assert_eq!(sample, MetricSample::Value(21.4));

        let request_line = request.recv().unwrap();
        assert!(request_line.starts_with("GET /api/v1/query?query=thermometer_temperature_celsius"));
    }

    #[test]
    fn test_fetch_service_unavailable() {
        let (base_url, _request) = serve_once("503 Service Unavailable", "");
        let mut client = PrometheusClient::new(&base_url, Duration::from_secs(2)).unwrap();
        assert_eq!(client.fetch("up"), MetricSample::Error);
    }

    #[test]
    fn test_fetch_times_out_on_silent_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        // Accepts the connection and never answers.
        let _server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(10));
            drop(stream);
        });

        let timeout = Duration::from_secs(1);
        let mut client = PrometheusClient::new(&base_url, timeout).unwrap();
        let started = std::time::Instant::now();
        assert_eq!(client.fetch("up"), MetricSample::Error);

        let elapsed = started.elapsed();
        assert!(elapsed >= timeout, "returned after {elapsed:?}");
        assert!(elapsed < timeout * 4, "returned after {elapsed:?}");
    }

    #[test]
    fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut client = PrometheusClient::new(&base_url, Duration::from_secs(1)).unwrap();
        assert_eq!(client.fetch("up"), MetricSample::Error);
    }
}

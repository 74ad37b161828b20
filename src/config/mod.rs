use std::time::Duration;

pub mod dashboard_config;
pub mod template;

fn default_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_brightness() -> u8 {
    15
}

fn default_screencap() -> std::path::PathBuf {
    "screencap.png".into()
}

fn default_router_interface() -> String {
    "wan".to_string()
}

fn default_clock_format() -> String {
    "%H:%M".to_string()
}

fn default_true() -> bool {
    true
}

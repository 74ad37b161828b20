/// Native panel size in portrait orientation.
pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 480;

/// Shown in place of a value that could not be fetched or parsed.
pub const ERR_MARKER: &str = "ERR";

pub const PROMETHEUS_QUERY_PATH: &str = "/api/v1/query";
pub const ROUTER_TRAFFIC_PATH: &str = "/api/diagnostics/traffic/interface";

pub const REV_A_SERIAL_NUMBER: &str = "USB35INCHIPSV2";
pub const REV_B_SERIAL_NUMBER: &str = "2017-2-25";

pub const MEBI: f64 = 1024.0 * 1024.0;

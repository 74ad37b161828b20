pub mod canvas;
pub mod unit_interval;

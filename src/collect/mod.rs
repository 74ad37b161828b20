use crate::collect::sample::MetricSample;

pub mod prometheus;
pub mod rate;
pub mod sample;
pub mod traffic;

/// Resolves one backend query to its latest scalar. Failures are logged by the
/// implementation and surface as [`MetricSample::Error`].
pub trait MetricFetcher {
    fn fetch(&mut self, query: &str) -> MetricSample;
}

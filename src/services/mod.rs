pub mod credits;
pub mod generator;
pub mod metrics;
pub mod orders;
pub mod users;
pub mod wallpapers;

pub use metrics::MetricsService;

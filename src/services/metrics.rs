use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Instant;

use crate::errors::{AppError, Result};

pub struct MetricsService {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    generations: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["method", "route", "status"],
        )
        .map_err(metrics_error)?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"),
            &["method", "route"],
        )
        .map_err(metrics_error)?;
        let generations = IntCounterVec::new(
            Opts::new("wallpaper_generations_total", "Wallpaper generation requests by outcome"),
            &["outcome"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(http_requests.clone())).map_err(metrics_error)?;
        registry.register(Box::new(http_duration.clone())).map_err(metrics_error)?;
        registry.register(Box::new(generations.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            generations,
        })
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, started: Instant) {
        self.http_requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[method, route])
            .observe(started.elapsed().as_secs_f64());
    }

    pub fn record_generation(&self, outcome: &str) {
        self.generations.with_label_values(&[outcome]).inc();
    }

    pub fn generation_count(&self, outcome: &str) -> u64 {
        self.generations.with_label_values(&[outcome]).get()
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

/// Label for the generation outcome counter.
pub fn generation_outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AppError::InsufficientCredits) => "insufficient_credits",
        Err(AppError::InvalidParams) => "invalid_params",
        Err(AppError::Generation(_)) => "generation_failed",
        Err(AppError::Storage(_)) => "upload_failed",
        Err(_) => "error",
    }
}

fn metrics_error(e: prometheus::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("Metrics error: {}", e))
}

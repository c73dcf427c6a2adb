pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod money;
pub mod notifications;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::api::session::SessionKeys;
use crate::notifications::VerificationMailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionKeys,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: VerificationMailer,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sessions = SessionKeys::new(&config.auth.secret, config.auth.session_max_age_days);
        let mailer = VerificationMailer::new(config.email.clone());
        Self {
            config,
            db,
            sessions,
            rate_limiter,
            mailer,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

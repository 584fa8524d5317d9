pub mod commands;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod session;
pub mod shell;
pub mod transport;

use config::AppConfig;
use coordinator::SessionCoordinator;
use db::Database;
use error::AppError;
use std::sync::Arc;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;
use transport::http::{HttpConfig, HttpTransport};

/// Parse `filter`, falling back to the default directives when it is invalid.
fn log_filter(filter: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(filter) {
        Ok(parsed) => (parsed, None),
        Err(e) => (EnvFilter::new(config::DEFAULT_LOG_FILTER), Some(e)),
    }
}

fn init_logging(filter: &str) {
    let (env_filter, rejected) = log_filter(filter);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    if let Some(e) = rejected {
        tracing::warn!(filter, error = %e, default = config::DEFAULT_LOG_FILTER, "invalid log filter, using default");
    }
}

pub fn run() -> Result<(), AppError> {
    let env = |key: &str| std::env::var(key).ok();
    let data_dir = config::data_dir(env);
    let database = Database::new(&data_dir)?;
    let config = config::init(AppConfig::resolve(env, data_dir, &database)?)?;

    init_logging(&config.log_filter);
    tracing::info!(api = %config.api_base_url, data_dir = %config.data_dir.display(), "starting");

    let transport = Arc::new(HttpTransport::new(HttpConfig {
        base_url: config.api_base_url.clone(),
    }));
    let coordinator = SessionCoordinator::new(transport);

    // Everything runs on one thread; sessions only yield at network calls
    // and timers.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(shell::run(&coordinator, &database))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_reports_invalid_directives() {
        let (_, rejected) = log_filter("docqa=debug,reqwest=warn");
        assert!(rejected.is_none());

        let (filter, rejected) = log_filter("docqa=loudest");
        assert!(rejected.is_some());
        assert_eq!(filter.to_string(), EnvFilter::new(config::DEFAULT_LOG_FILTER).to_string());
    }
}

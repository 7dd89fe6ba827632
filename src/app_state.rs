//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::{ActionSignal, EventBus, LogbookRegistry};
use crate::service::LogbookService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Logbook service for all business logic.
    pub logbook_service: Arc<LogbookService>,
    /// Use the first `X-Forwarded-For` address as the client identity.
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Builds the state for an empty registry, publishing signals on
    /// `signals`.
    #[must_use]
    pub fn new(config: &GatewayConfig, signals: EventBus<ActionSignal>) -> Self {
        let registry = Arc::new(LogbookRegistry::new());
        Self {
            logbook_service: Arc::new(LogbookService::new(registry, signals, config.lock_ttl())),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

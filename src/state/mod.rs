//! Shared application state
//!
//! Everything a handler needs is cloned out of [`AppState`]; each member is
//! cheap to clone (pools, clients and `Arc`s).

use std::sync::Arc;

use crate::config::Settings;
use crate::database::{DatabasePool, DatabaseService};
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;

#[derive(Clone, Debug)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseService,
    pub services: ServiceFactory,
    pub v_code_limiter: RateLimitMiddleware,
}

impl AppState {
    pub fn new(settings: Settings, pool: DatabasePool) -> Result<Self> {
        let services = ServiceFactory::new(&settings)?;
        let v_code_limiter = RateLimitMiddleware::from_settings(&settings.rate_limit);

        Ok(Self {
            settings: Arc::new(settings),
            db: DatabaseService::new(pool),
            services,
            v_code_limiter,
        })
    }

    /// Signed URL for a stored object
    pub fn access_url(&self, path: &str) -> String {
        self.services.storage_service.access_url(path)
    }
}

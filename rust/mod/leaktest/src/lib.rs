pub mod api;
pub mod model;
pub mod report;
pub mod serial;
pub mod service;
pub mod submission;

use std::sync::Arc;

use axum::Router;
use leakcheck_blob::BlobStore;
use leakcheck_core::{Module, ServiceError};
use leakcheck_sql::SQLStore;

pub use serial::{SerialNumber, SerialPolicy};
pub use service::{LeakTestService, ServiceOptions};

/// The leak-test module: submission, numbering, listing and certificates
/// of pressure tests.
pub struct LeakTestModule {
    service: Arc<LeakTestService>,
}

impl LeakTestModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        options: ServiceOptions,
    ) -> Result<Self, ServiceError> {
        let service = LeakTestService::new(sql, blob, options)?;
        Ok(Self {
            service: Arc::new(service),
        })
    }

    pub fn service(&self) -> &Arc<LeakTestService> {
        &self.service
    }

    /// Routes kept at their historical root paths (`POST /new-test`).
    pub fn legacy_routes(&self) -> Router {
        api::legacy_router(Arc::clone(&self.service))
    }
}

impl Module for LeakTestModule {
    fn name(&self) -> &str {
        "leaktest"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}

mod records;
mod submit;

use std::sync::Arc;

use axum::Router;

use leakcheck_core::ServiceError;

use crate::service::LeakTestService;

type ServiceState = Arc<LeakTestService>;

/// Build the leak-test router.
///
/// Routes:
/// - `POST   /v1/tests`  submit a test (multipart)
/// - `GET    /v1/tests`  list tests, newest first
/// - `GET    /v1/tests/{id}`  get test
/// - `GET    /v1/tests/{id}/photo`  photo bytes
/// - `GET    /v1/tests/{id}/report.pdf`  certificate
/// - `DELETE /v1/tests/{id}`  delete test
pub fn router(service: Arc<LeakTestService>) -> Router {
    Router::new()
        .merge(submit::router(Arc::clone(&service), "/v1/tests"))
        .merge(records::router(service))
}

/// `POST /new-test`, the form target used by existing clients.
pub fn legacy_router(service: Arc<LeakTestService>) -> Router {
    submit::router(service, "/new-test")
}

/// Run a storage-bound service call on the blocking pool.
async fn blocking<T, F>(service: &ServiceState, f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce(&LeakTestService) -> Result<T, ServiceError> + Send + 'static,
{
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {}", e)))?
}

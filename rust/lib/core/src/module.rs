use axum::Router;

/// A feature area that serves HTTP routes.
///
/// The server nests each module's router under `/{name}`.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Routes relative to the module prefix, with state already applied.
    fn routes(&self) -> Router;
}

//! Route registration: module routes plus system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use leakcheck_core::Module;
use leaktest::LeakTestModule;

/// Build the complete router.
pub fn build_router(leaktest: &LeakTestModule) -> Router {
    let system_routes = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    let modules: [&dyn Module; 1] = [leaktest];

    let mut app = system_routes;
    // Mount each module's routes under /{module_name}.
    for module in modules {
        app = app.nest(&format!("/{}", module.name()), module.routes());
    }

    app.merge(leaktest.legacy_routes())
        .layer(CorsLayer::permissive())
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "leakcheckd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

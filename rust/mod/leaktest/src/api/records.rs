use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use leakcheck_core::{ListParams, ListResult, ServiceError};

use super::{blocking, ServiceState};
use crate::model::TestRecord;
use crate::service::LeakTestService;

pub fn router(service: Arc<LeakTestService>) -> Router {
    Router::new()
        .route("/v1/tests", get(list_tests))
        .route("/v1/tests/{id}", get(get_test).delete(delete_test))
        .route("/v1/tests/{id}/photo", get(get_photo))
        .route("/v1/tests/{id}/report.pdf", get(get_report))
        .with_state(service)
}

// ---------------------------------------------------------------------------
// GET /v1/tests
// ---------------------------------------------------------------------------

async fn list_tests(
    State(service): State<ServiceState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<TestRecord>>, ServiceError> {
    let result = blocking(&service, move |svc| svc.list_tests(&params)).await?;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// GET /v1/tests/{id}
// ---------------------------------------------------------------------------

async fn get_test(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<TestRecord>, ServiceError> {
    let record = blocking(&service, move |svc| svc.get_test(&id)).await?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// GET /v1/tests/{id}/photo
// ---------------------------------------------------------------------------

async fn get_photo(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let (content_type, bytes) = blocking(&service, move |svc| svc.get_photo(&id)).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/tests/{id}/report.pdf
// ---------------------------------------------------------------------------

async fn get_report(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let disposition = format!("inline; filename=\"leak-test-{}.pdf\"", id);
    let (content_type, bytes) = blocking(&service, move |svc| svc.render_report(&id)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// DELETE /v1/tests/{id}
// ---------------------------------------------------------------------------

async fn delete_test(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let record = blocking(&service, move |svc| svc.delete_test(&id)).await?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "serialNumber": record.serial_number,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::serial::SerialPolicy;
    use crate::service::testing::{at, form, service};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn read_endpoints() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let first = svc.submit_at(form("Cooler A"), at(0)).unwrap();
        svc.submit_at(form("Freezer B"), at(60)).unwrap();
        let app = crate::api::router(Arc::new(svc));

        let resp = app.clone().oneshot(get("/v1/tests?q=cooler")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(v["total"], 1);
        assert_eq!(v["items"][0]["device"]["name"], "Cooler A");
        assert_eq!(v["items"][0]["held45Minutes"], true);
        assert_eq!(v["items"][0]["medium"], "OL");

        let resp = app
            .clone()
            .oneshot(get(&format!("/v1/tests/{}", first.id)))
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(v["serialNumber"], 1);

        let resp = app
            .clone()
            .oneshot(get(&format!("/v1/tests/{}/photo", first.id)))
            .await
            .unwrap();
        assert_eq!(resp.headers()["content-type"], "image/jpeg");
        assert_eq!(body_bytes(resp).await, vec![0xFF, 0xD8, 0xFF, 0xE0]);

        let resp = app
            .oneshot(get(&format!("/v1/tests/{}/report.pdf", first.id)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/pdf");
        assert!(body_bytes(resp).await.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn delete_then_not_found() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let created = svc.submit_at(form("K-12"), at(0)).unwrap();
        let app = crate::api::router(Arc::new(svc));
        let uri = format!("/v1/tests/{}", created.id);

        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let v: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(v["code"], "NOT_FOUND");
    }
}

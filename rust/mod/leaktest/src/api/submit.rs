use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use leakcheck_core::ServiceError;

use super::{blocking, ServiceState};
use crate::serial::SerialNumber;
use crate::service::LeakTestService;
use crate::submission::{Photo, SubmissionForm};

/// Room for the text fields and multipart framing on top of the photo.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn router(service: Arc<LeakTestService>, path: &str) -> Router {
    let limit = service.options().max_photo_bytes + FORM_OVERHEAD;
    Router::new()
        .route(path, post(create_test))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(service)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedTest {
    id: String,
    serial_number: SerialNumber,
}

async fn create_test(
    State(service): State<ServiceState>,
    multipart: Multipart,
) -> Result<Json<CreatedTest>, ServiceError> {
    let form = read_form(multipart).await?;
    let record = blocking(&service, move |svc| svc.submit(form)).await?;
    Ok(Json(CreatedTest {
        id: record.id,
        serial_number: record.serial_number,
    }))
}

async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, ServiceError> {
    let mut form = SubmissionForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "photo" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(bad_form)?;
            form.photo = Some(Photo {
                bytes: bytes.to_vec(),
                content_type,
            });
        } else {
            let value = field.text().await.map_err(bad_form)?;
            form.set_field(&name, value);
        }
    }
    Ok(form)
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::Validation(format!("malformed form: {}", e.body_text()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::api::test_support::{multipart_body, post_form, valid_fields};
    use crate::serial::SerialPolicy;
    use crate::service::testing::service;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    async fn json(resp: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn submit_returns_id_and_serial() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let app = crate::api::router(Arc::new(svc));

        let body = multipart_body(&valid_fields("K-12"), Some(("image/jpeg", JPEG)));
        let resp = app.oneshot(post_form("/v1/tests", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let v = json(resp).await;
        assert_eq!(v["serialNumber"], 1);
        assert_eq!(v["id"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn legacy_path_accepts_the_same_form() {
        let (svc, _dir) = service(SerialPolicy::GapFilling);
        let app = crate::api::legacy_router(Arc::new(svc));

        let body = multipart_body(&valid_fields("K-12"), Some(("image/jpeg", JPEG)));
        let resp = app.oneshot(post_form("/new-test", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["serialNumber"], 1);
    }

    #[tokio::test]
    async fn invalid_medium_is_bad_request() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let app = crate::api::router(Arc::new(svc));

        let mut fields = valid_fields("K-12");
        fields.retain(|(name, _)| *name != "medium");
        fields.push(("medium", "XX"));
        let body = multipart_body(&fields, Some(("image/jpeg", JPEG)));
        let resp = app.oneshot(post_form("/v1/tests", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(resp).await["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn missing_photo_is_bad_request() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let app = crate::api::router(Arc::new(svc));

        let body = multipart_body(&valid_fields("K-12"), None);
        let resp = app.oneshot(post_form("/v1/tests", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn quick_resubmit_is_conflict_until_confirmed() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let app = crate::api::router(Arc::new(svc));

        let body = multipart_body(&valid_fields("K-12"), Some(("image/jpeg", JPEG)));
        let resp = app
            .clone()
            .oneshot(post_form("/v1/tests", body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(post_form("/v1/tests", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json(resp).await["code"], "DUPLICATE_SUBMISSION");

        let mut fields = valid_fields("K-12");
        fields.push(("confirm_duplicate", "true"));
        let body = multipart_body(&fields, Some(("image/jpeg", JPEG)));
        let resp = app.oneshot(post_form("/v1/tests", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["serialNumber"], 2);
    }
}

//! Fills in the `request_id`/`path`/`method` fields that
//! [`AppError::into_response`](crate::error::AppError) leaves blank —
//! this is the one layer that has both the response body and the
//! request it came from in hand (spec §4.11).

use axum::{
    body::Body,
    extract::Request,
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::Response,
};
use service_core::middleware::tracing::REQUEST_ID_HEADER;

pub async fn fill_error_envelope(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    if response.status().is_success() {
        return response;
    }

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, 64 * 1024).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("request_id") {
            obj.insert("request_id".into(), serde_json::Value::String(request_id));
            obj.insert("path".into(), serde_json::Value::String(path));
            obj.insert("method".into(), serde_json::Value::String(method));
        }
    }

    let encoded = serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec());
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(encoded))
}

//! KYC dispatch surface (C13): thin transport adapters over OCR, face
//! compare, face search and liveness. Each handler threads the same
//! spine — dispatch permission/scope check, quota consume, vendor call,
//! KycRequest persistence, audit — before handing off to the vendor
//! client in `services::vendor`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::crypto;
use crate::error::AppError;
use crate::middleware::authz::require_key_scope;
use crate::middleware::Authenticated;
use crate::models::{KycRequestSnapshot, KycRequestStatus, KycRequestType, Permission, ServiceType};
use crate::services::AuthContext;
use crate::AppState;

use super::Envelope;

/// API-key/OAuth-client callers are scope-checked; user-JWT callers
/// (console testing) fall back to the blanket `kyc.dispatch` permission.
/// Matches spec §4.4 rule 5 for the key/token path and rule 3 otherwise.
fn require_dispatch(ctx: &AuthContext, scope: &str) -> Result<(), AppError> {
    if ctx.api_key_id.is_some() || ctx.oauth_client_id.is_some() {
        require_key_scope(ctx, scope)
    } else {
        crate::middleware::authz::require_permission(ctx, Permission::KycDispatch)
    }
}

/// Marks a request `Failed` and propagates the original error when
/// quota consumption is denied after the `KycRequest` row already
/// exists, so a quota rejection never leaves a row stuck `processing`.
async fn consume_quota_or_fail(
    state: &AppState,
    request_id: Uuid,
    org_id: uuid::Uuid,
    service_type: ServiceType,
) -> Result<(), AppError> {
    if let Err(e) = state.quota.check_and_consume(org_id, service_type).await {
        let _ = state
            .db
            .complete_kyc_request(request_id, KycRequestStatus::Failed, Some(&e.to_string()))
            .await;
        return Err(e);
    }
    Ok(())
}

fn client_ip_from_ctx(_ctx: &AuthContext) -> &'static str {
    // Resolved upstream by the rate-limit/observe layers; the dispatch
    // handlers themselves don't need it beyond the KycRequest row, where
    // an unresolved caller-facing IP is acceptable ("unknown").
    "unknown"
}

async fn read_multipart_field(multipart: &mut Multipart, name: &str) -> Option<(String, Vec<u8>)> {
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name == name {
            let file_name = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field.bytes().await.ok()?.to_vec();
            return Some((file_name, bytes));
        }
    }
    None
}

struct OcrForm {
    image: Vec<u8>,
    filename: String,
    language: Option<String>,
}

async fn parse_ocr_form(mut multipart: Multipart) -> Result<OcrForm, AppError> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut language = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "image" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read image part: {e}")))?;
                image = Some((filename, bytes.to_vec()));
            }
            "language" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read language part: {e}")))?;
                language = Some(text);
            }
            _ => {}
        }
    }
    let (filename, image) = image.ok_or_else(|| AppError::Validation("missing `image` part".into()))?;
    Ok(OcrForm { image, filename, language })
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub success: bool,
    pub message: Option<String>,
    pub data: Value,
    pub request_id: Uuid,
}

pub async fn ocr(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Envelope<OcrResponse>>, AppError> {
    require_dispatch(&ctx, "ocr:read")?;
    let form = parse_ocr_form(multipart).await?;

    let request = state
        .db
        .insert_kyc_request(Uuid::new_v4(), ctx.org_id, KycRequestType::Ocr, client_ip_from_ctx(&ctx), None)
        .await?;

    consume_quota_or_fail(&state, request.id, ctx.org_id, ServiceType::Ocr).await?;

    let result = state.vendor.ocr(form.image, form.filename, form.language).await;
    finish_dispatch(&state, &ctx, request.id, "ocr", &result).await?;
    let result = result?;

    Ok(Json(Envelope::new(OcrResponse {
        success: result.success,
        message: result.message,
        data: result.data,
        request_id: request.id,
    })))
}

#[derive(Debug, Serialize)]
pub struct FaceVerifyResponse {
    pub success: bool,
    pub score: Option<f64>,
    pub threshold: Option<f64>,
    pub request_id: Uuid,
}

pub async fn face_verify(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<FaceVerifyResponse>>, AppError> {
    require_dispatch(&ctx, "face:write")?;

    let (_, image_a) = read_multipart_field(&mut multipart, "image_a")
        .await
        .ok_or_else(|| AppError::Validation("missing `image_a` part".into()))?;
    let (_, image_b) = read_multipart_field(&mut multipart, "image_b")
        .await
        .ok_or_else(|| AppError::Validation("missing `image_b` part".into()))?;

    let request = state
        .db
        .insert_kyc_request(Uuid::new_v4(), ctx.org_id, KycRequestType::FaceVerify, client_ip_from_ctx(&ctx), None)
        .await?;

    consume_quota_or_fail(&state, request.id, ctx.org_id, ServiceType::Face).await?;

    let result = state.vendor.face_verify(image_a, image_b).await;
    finish_dispatch(&state, &ctx, request.id, "face_verify", &result).await?;
    let result = result?;

    Ok(Json(Envelope::new(FaceVerifyResponse {
        success: result.success,
        score: result.data.get("score").and_then(Value::as_f64),
        threshold: result.data.get("threshold").and_then(Value::as_f64),
        request_id: request.id,
    })))
}

#[derive(Debug, Serialize)]
pub struct FaceSearchResponse {
    pub success: bool,
    pub searching_results: Vec<Value>,
    pub request_id: Uuid,
}

pub async fn face_search(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<FaceSearchResponse>>, AppError> {
    require_dispatch(&ctx, "face:read")?;

    let (_, image) = read_multipart_field(&mut multipart, "image")
        .await
        .ok_or_else(|| AppError::Validation("missing `image` part".into()))?;

    let request = state
        .db
        .insert_kyc_request(Uuid::new_v4(), ctx.org_id, KycRequestType::FaceSearch, client_ip_from_ctx(&ctx), None)
        .await?;

    consume_quota_or_fail(&state, request.id, ctx.org_id, ServiceType::Face).await?;

    let result = state.vendor.face_search(image).await;
    finish_dispatch(&state, &ctx, request.id, "face_search", &result).await?;
    let result = result?;

    let raw_results = result
        .data
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut rewritten = Vec::with_capacity(raw_results.len());
    for mut entry in raw_results {
        if let Some(path) = entry.get("picture_path").and_then(Value::as_str).map(str::to_string) {
            let asset = state.db.get_or_create_face_image_ref(ctx.org_id, &path).await?;
            if let Some(obj) = entry.as_object_mut() {
                obj.remove("picture_path");
                obj.insert("asset_id".into(), Value::String(asset.internal_asset_id.to_string()));
            }
        }
        rewritten.push(entry);
    }

    Ok(Json(Envelope::new(FaceSearchResponse {
        success: result.success,
        searching_results: rewritten,
        request_id: request.id,
    })))
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct FullVerifyRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub idcard: String,
    #[validate(length(min = 1))]
    pub phone: String,
    pub idcard_image_base64: String,
    pub face_image_base64: String,
}

#[derive(Debug, Serialize)]
pub struct FullVerifyResponse {
    pub request_id: Uuid,
    pub status: KycRequestStatus,
    pub message: Option<String>,
}

/// `POST /kyc/verify`: the combined OCR + face-compare workflow. The
/// PII triple (name/idcard/phone) is sealed with AES-256-GCM before it
/// ever reaches the database; the idcard additionally gets a truncated
/// SHA-256 index hash so a duplicate submission can be looked up
/// without decrypting anything.
pub async fn verify(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Json(req): Json<FullVerifyRequest>,
) -> Result<Json<Envelope<FullVerifyResponse>>, AppError> {
    use validator::Validate;
    require_dispatch(&ctx, "kyc:write")?;
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let key = state.config.security.encryption_key.as_bytes();
    let idcard_sealed = crypto::aes_seal_str(&req.idcard, key)?;
    let idcard_index_hash = crypto::idcard_index_hash(&req.idcard);
    let name_sealed = crypto::aes_seal_str(&req.name, key)?;
    let phone_sealed = crypto::aes_seal_str(&req.phone, key)?;

    let request = state
        .db
        .insert_kyc_request(Uuid::new_v4(), ctx.org_id, KycRequestType::FullVerify, client_ip_from_ctx(&ctx), None)
        .await?;
    state
        .db
        .attach_kyc_pii(request.id, &idcard_sealed, &idcard_index_hash, &name_sealed, &phone_sealed)
        .await?;

    consume_quota_or_fail(&state, request.id, ctx.org_id, ServiceType::Ocr).await?;
    consume_quota_or_fail(&state, request.id, ctx.org_id, ServiceType::Face).await?;

    let idcard_image = base64_decode(&req.idcard_image_base64)?;
    let face_image = base64_decode(&req.face_image_base64)?;

    let ocr_result = state.vendor.ocr(idcard_image, "idcard.jpg".into(), None).await;
    let face_result = match &ocr_result {
        Ok(r) if r.success => Some(state.vendor.face_verify(face_image.clone(), face_image).await),
        _ => None,
    };

    let overall_ok = matches!(&ocr_result, Ok(r) if r.success) && matches!(&face_result, Some(Ok(r)) if r.success);
    let status = if overall_ok { KycRequestStatus::Success } else { KycRequestStatus::Failed };
    let error_message = if overall_ok {
        None
    } else if let Err(e) = &ocr_result {
        Some(format!("OCR_FAILED: {e}"))
    } else if let Some(Err(e)) = &face_result {
        Some(format!("FACE_VERIFY_FAILED: {e}"))
    } else {
        Some("FACE_VERIFY_FAILED: vendor reported no match".to_string())
    };

    state
        .db
        .complete_kyc_request(request.id, status, error_message.as_deref())
        .await?;

    record_dispatch_metrics("full_verify", overall_ok);
    state
        .audit
        .record(
            &request.id.to_string(),
            ctx.user_id,
            Some(ctx.org_id),
            "kyc.verify",
            "kyc_request",
            client_ip_from_ctx(&ctx),
            None,
            if overall_ok { "success" } else { "failed" },
            error_message.as_deref(),
        )
        .await;
    touch_key_usage(&state, &ctx, overall_ok).await;

    Ok(Json(Envelope::new(FullVerifyResponse {
        request_id: request.id,
        status,
        message: error_message,
    })))
}

pub async fn status(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<KycRequestSnapshot>>, AppError> {
    require_dispatch(&ctx, "kyc:read")?;
    let request = state
        .db
        .find_kyc_request(id, ctx.org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("kyc request not found".into()))?;
    Ok(Json(Envelope::new((&request).into())))
}

#[derive(Debug, Deserialize)]
struct LivenessFrame {
    action: String,
    #[serde(default)]
    frame_base64: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Serialize)]
struct LivenessAck {
    action: String,
    success: bool,
    message: Option<String>,
}

/// `WS /kyc/liveness/ws`: action challenges exchanged one frame at a
/// time. No request body is persisted beyond a summarised marker — the
/// `KycRequest` row tracks only the session outcome, never raw frames.
pub async fn liveness_ws(
    Authenticated(ctx): Authenticated,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| liveness_session(socket, state, ctx))
}

async fn liveness_session(mut socket: WebSocket, state: AppState, ctx: AuthContext) {
    if require_dispatch(&ctx, "liveness:write").is_err() {
        let _ = socket
            .send(Message::Text(serde_json::json!({"error": "PERMISSION_DENIED"}).to_string()))
            .await;
        let _ = socket.close().await;
        return;
    }

    let request = match state
        .db
        .insert_kyc_request(Uuid::new_v4(), ctx.org_id, KycRequestType::Liveness, client_ip_from_ctx(&ctx), None)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            let _ = socket.send(Message::Text(format!("{{\"error\":\"{e}\"}}"))).await;
            return;
        }
    };

    if let Err(e) = state.quota.check_and_consume(ctx.org_id, ServiceType::Liveness).await {
        let _ = socket.send(Message::Text(format!("{{\"error\":\"{e}\"}}"))).await;
        let _ = state
            .db
            .complete_kyc_request(request.id, KycRequestStatus::Failed, Some("QUOTA_EXCEEDED"))
            .await;
        return;
    }

    let mut overall_ok = true;
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<LivenessFrame>(&text) else {
            let _ = socket
                .send(Message::Text(serde_json::json!({"error": "malformed liveness frame"}).to_string()))
                .await;
            continue;
        };
        let frame_bytes = base64_decode(&frame.frame_base64).unwrap_or_default();
        let result = state.vendor.liveness_action(frame.action.clone(), frame_bytes).await;
        let success = matches!(&result, Ok(r) if r.success);
        overall_ok &= success;

        let ack = LivenessAck {
            action: frame.action,
            success,
            message: result.err().map(|e| e.to_string()),
        };
        if socket.send(Message::Text(serde_json::to_string(&ack).unwrap_or_default())).await.is_err() {
            break;
        }
        if frame.done {
            break;
        }
    }

    let final_status = if overall_ok { KycRequestStatus::Success } else { KycRequestStatus::Failed };
    let _ = state.db.complete_kyc_request(request.id, final_status, None).await;
    record_dispatch_metrics("liveness", overall_ok);
    touch_key_usage(&state, &ctx, overall_ok).await;
    let _ = socket.close().await;
}

/// Shared success/failure tail for the single-shot (non-WS) dispatch
/// handlers: persists the terminal `KycRequest` status, counts the
/// business error when the vendor failed, records an audit row and
/// touches the caller's API-key rolling counters.
async fn finish_dispatch(
    state: &AppState,
    ctx: &AuthContext,
    request_id: Uuid,
    operation: &str,
    result: &Result<crate::services::vendor::VendorResult, AppError>,
) -> Result<(), AppError> {
    let (status, error_message) = match result {
        Ok(r) if r.success => (KycRequestStatus::Success, None),
        Ok(r) => (KycRequestStatus::Failed, r.message.clone()),
        Err(e) => (KycRequestStatus::Failed, Some(e.to_string())),
    };
    state
        .db
        .complete_kyc_request(request_id, status, error_message.as_deref())
        .await?;

    let ok = status == KycRequestStatus::Success;
    record_dispatch_metrics(operation, ok);
    state
        .audit
        .record(
            &request_id.to_string(),
            ctx.user_id,
            Some(ctx.org_id),
            &format!("kyc.{operation}"),
            "kyc_request",
            client_ip_from_ctx(ctx),
            None,
            if ok { "success" } else { "failed" },
            error_message.as_deref(),
        )
        .await;
    touch_key_usage(state, ctx, ok).await;
    Ok(())
}

fn record_dispatch_metrics(operation: &str, success: bool) {
    if !success {
        crate::services::audit::record_business_error(operation, &format!("{operation}_failed"));
    }
}

async fn touch_key_usage(state: &AppState, ctx: &AuthContext, success: bool) {
    if let Some(key_id) = ctx.api_key_id {
        if let Err(e) = state.db.touch_api_key_usage(key_id, success).await {
            tracing::warn!(error = %e, "failed to update api key rolling counters");
        }
    }
}

fn base64_decode(s: &str) -> Result<Vec<u8>, AppError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| AppError::Validation(format!("invalid base64 payload: {e}")))
}

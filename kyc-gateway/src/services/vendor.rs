//! KYC dispatch surface transport adapters (C13): thin multipart HTTP
//! clients over the OCR / face-compare / face-search / liveness
//! vendors, with exponential-backoff retry on 5xx and transport errors.

use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::VendorConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct VendorClient {
    http: Client,
    config: VendorConfig,
}

/// A vendor response is considered successful only when `code == 0`;
/// any other value is a business-level vendor failure, never retried.
#[derive(Debug, Deserialize)]
struct VendorEnvelope {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone)]
pub struct VendorResult {
    pub success: bool,
    pub message: Option<String>,
    pub data: Value,
}

impl VendorClient {
    pub fn new(config: VendorConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build vendor http client");
        Self { http, config }
    }

    pub async fn ocr(&self, image: Vec<u8>, filename: String, language: Option<String>) -> Result<VendorResult, AppError> {
        if self.config.use_mock {
            return Ok(mock_success());
        }
        let url = format!("{}/ocr", self.config.ocr_base_url);
        self.dispatch(&url, "ocr", self.config.timeout_secs, move || {
            let mut form = multipart::Form::new().part(
                "image",
                multipart::Part::bytes(image.clone()).file_name(filename.clone()),
            );
            if let Some(lang) = &language {
                form = form.text("language", lang.clone());
            }
            form
        })
        .await
    }

    pub async fn face_verify(&self, image_a: Vec<u8>, image_b: Vec<u8>) -> Result<VendorResult, AppError> {
        if self.config.use_mock {
            return Ok(mock_success());
        }
        let url = format!("{}/verify", self.config.face_base_url);
        self.dispatch(&url, "face_verify", self.config.timeout_secs, move || {
            multipart::Form::new()
                .part("image_a", multipart::Part::bytes(image_a.clone()).file_name("a.jpg"))
                .part("image_b", multipart::Part::bytes(image_b.clone()).file_name("b.jpg"))
        })
        .await
    }

    pub async fn face_search(&self, image: Vec<u8>) -> Result<VendorResult, AppError> {
        if self.config.use_mock {
            return Ok(mock_success());
        }
        let url = format!("{}/search", self.config.face_base_url);
        self.dispatch(&url, "face_search", self.config.timeout_secs, move || {
            multipart::Form::new().part("image", multipart::Part::bytes(image.clone()).file_name("probe.jpg"))
        })
        .await
    }

    /// A single liveness challenge/response round over the vendor's
    /// REST surface; the WebSocket session in the handler layer drives
    /// a sequence of these, one per action frame.
    pub async fn liveness_action(&self, action: String, frame: Vec<u8>) -> Result<VendorResult, AppError> {
        if self.config.use_mock {
            return Ok(mock_success());
        }
        let url = format!("{}/liveness", self.config.liveness_base_url);
        self.dispatch(&url, "liveness", self.config.liveness_timeout_secs, move || {
            multipart::Form::new()
                .text("action", action.clone())
                .part("frame", multipart::Part::bytes(frame.clone()).file_name("frame.jpg"))
        })
        .await
    }

    /// Rebuilds the multipart form fresh on every attempt (it isn't
    /// `Clone`), retrying transport errors and 5xx/429 responses with
    /// `backoff::future::retry`'s exponential schedule, capped at
    /// `max_retries` attempts; a parsed vendor envelope with `code != 0`
    /// is a business failure and is returned immediately, never retried.
    async fn dispatch(
        &self,
        url: &str,
        operation: &str,
        _timeout_secs: u64,
        build_form: impl Fn() -> multipart::Form,
    ) -> Result<VendorResult, AppError> {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_secs.max(1) * (self.config.max_retries as u64 + 1))),
            ..Default::default()
        };

        retry(policy, || async {
            let attempt = attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let response = self.http.post(url).multipart(build_form()).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let envelope: VendorEnvelope = resp.json().await.map_err(|e| {
                        backoff::Error::permanent(AppError::UpstreamUnavailable(format!(
                            "{operation}: malformed vendor response: {e}"
                        )))
                    })?;
                    Ok(VendorResult {
                        success: envelope.code == 0,
                        message: envelope.message,
                        data: envelope.data,
                    })
                }
                Ok(resp) if resp.status().is_server_error() || resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.config.max_retries {
                        return Err(backoff::Error::permanent(AppError::UpstreamUnavailable(format!(
                            "{operation}: vendor returned {} after {attempt} retries",
                            resp.status()
                        ))));
                    }
                    Err(backoff::Error::transient(AppError::UpstreamUnavailable(format!(
                        "{operation}: vendor returned {}",
                        resp.status()
                    ))))
                }
                Ok(resp) => Err(backoff::Error::permanent(AppError::UpstreamUnavailable(format!(
                    "{operation}: vendor returned {}",
                    resp.status()
                )))),
                Err(e) if e.is_timeout() => {
                    if attempt >= self.config.max_retries {
                        return Err(backoff::Error::permanent(AppError::UpstreamTimeout(operation.to_string())));
                    }
                    Err(backoff::Error::transient(AppError::UpstreamTimeout(operation.to_string())))
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(backoff::Error::permanent(AppError::UpstreamUnavailable(format!("{operation}: {e}"))));
                    }
                    Err(backoff::Error::transient(AppError::UpstreamUnavailable(format!("{operation}: {e}"))))
                }
            }
        })
        .await
        .map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })
    }
}

fn mock_success() -> VendorResult {
    VendorResult {
        success: true,
        message: None,
        data: serde_json::json!({ "mock": true, "score": 0.98 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VendorConfig {
        VendorConfig {
            ocr_base_url: "http://localhost:9101".into(),
            face_base_url: "http://localhost:9102".into(),
            liveness_base_url: "http://localhost:9103".into(),
            timeout_secs: 30,
            liveness_timeout_secs: 60,
            max_retries: 2,
            use_mock: true,
        }
    }

    #[tokio::test]
    async fn mock_mode_short_circuits_every_vendor_call() {
        let client = VendorClient::new(test_config());
        let ocr = client.ocr(vec![1, 2, 3], "a.jpg".into(), None).await.unwrap();
        assert!(ocr.success);
        let verify = client.face_verify(vec![1], vec![2]).await.unwrap();
        assert!(verify.success);
    }
}

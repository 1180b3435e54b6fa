//! QR sign-in endpoints.
//!
//! The desktop asks the backend for a short-lived code, renders it, and
//! polls while the phone scans and confirms. Both endpoints wrap their
//! payload in a `{success, ...}` envelope on top of the usual HTTP status
//! mapping.

use serde_json::{json, Value};

use missive_shared::{MissiveError, Result};

use crate::auth::{auth_payload, malformed, AuthPayload};
use crate::ApiClient;

/// One poll of a pending QR sign-in.
#[derive(Debug, Clone)]
pub enum QrLoginStatus {
    /// Nobody has scanned the code yet.
    Pending,
    /// Scanned on the phone, waiting for confirmation there.
    Scanned,
    /// Confirmed; carries the established session.
    Confirmed(AuthPayload),
    /// The code expired before confirmation; generate a new one.
    Expired,
    /// The backend does not recognize the code.
    Invalid,
}

impl ApiClient {
    /// Request a fresh QR sign-in code for another device to scan.
    pub async fn generate_qr(&self) -> Result<String> {
        let body = self
            .send(self.post(self.url("api/qr/generate-qr")?, None))
            .await?;
        require_success(&body)?;
        body.get("qrCode")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| malformed("QR code"))
    }

    /// Poll the sign-in state of a previously generated code.
    pub async fn check_qr_login(&self, code: &str) -> Result<QrLoginStatus> {
        let body = self
            .send(
                self.post(self.url("api/qr/qr-login")?, None)
                    .json(&json!({ "qrCode": code })),
            )
            .await?;
        require_success(&body)?;

        match body.get("status").and_then(Value::as_str) {
            Some("pending") => Ok(QrLoginStatus::Pending),
            Some("scanned") => Ok(QrLoginStatus::Scanned),
            Some("confirmed") => auth_payload(&body)
                .map(QrLoginStatus::Confirmed)
                .ok_or_else(|| MissiveError::Api {
                    status: 200,
                    message: "Confirmation did not return a session".to_string(),
                }),
            Some("expired") => Ok(QrLoginStatus::Expired),
            Some("invalid") => Ok(QrLoginStatus::Invalid),
            other => Err(MissiveError::Api {
                status: 200,
                message: format!("Unknown QR sign-in status: {other:?}"),
            }),
        }
    }
}

fn require_success(body: &Value) -> Result<()> {
    if body.get("success") == Some(&Value::Bool(true)) {
        Ok(())
    } else {
        Err(MissiveError::Api {
            status: 200,
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("The server rejected the request")
                .to_string(),
        })
    }
}

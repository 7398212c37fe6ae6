// src/remote/mod.rs
//! Remote marketing API seam: envelopes, lists, campaigns, contacts.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Credentials;
use crate::error::DispatchError;

pub use http::HttpDeliveryApi;
pub use mock::{MockDeliveryApi, RemoteCall};

pub const RESPONSE_OK: &str = "ok";

/// Fields of a create-envelope request, creativity already encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(rename = "fromName")]
    pub from_name: String,
    pub subject: String,
    pub campaign: Option<String>,
    pub language: String,
    pub creativity: String,
    /// JSON array of audience tokens, serialized as a string on the wire.
    pub segments: String,
}

impl EnvelopeRequest {
    pub fn encode_creativity(html: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(html.as_bytes())
    }

    /// Form fields in wire order; `campaign` is left out when unset.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut f = vec![
            ("type", self.kind.clone()),
            ("name", self.name.clone()),
            ("fromName", self.from_name.clone()),
            ("subject", self.subject.clone()),
        ];
        if let Some(c) = &self.campaign {
            f.push(("campaign", c.clone()));
        }
        f.push(("language", self.language.clone()));
        f.push(("creativity", self.creativity.clone()));
        f.push(("segments", self.segments.clone()));
        f
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCampaign {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait DeliveryApi: Send + Sync {
    /// Returns the envelope id when the remote hands one back.
    async fn create_envelope(
        &self,
        creds: &Credentials,
        request: &EnvelopeRequest,
    ) -> Result<Option<String>, DispatchError>;

    /// Fire a prepared envelope now.
    async fn trigger_envelope(&self, creds: &Credentials, env_id: &str) -> Result<(), DispatchError>;

    async fn lists(&self, creds: &Credentials) -> Result<Vec<RemoteList>, DispatchError>;

    async fn create_list(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError>;

    async fn campaigns(&self, creds: &Credentials) -> Result<Vec<RemoteCampaign>, DispatchError>;

    async fn create_campaign(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError>;

    async fn subscribe(
        &self,
        creds: &Credentials,
        list_id: &str,
        email: &str,
    ) -> Result<(), DispatchError>;
}

#[async_trait]
impl<T: DeliveryApi + ?Sized> DeliveryApi for std::sync::Arc<T> {
    async fn create_envelope(
        &self,
        creds: &Credentials,
        request: &EnvelopeRequest,
    ) -> Result<Option<String>, DispatchError> {
        (**self).create_envelope(creds, request).await
    }
    async fn trigger_envelope(&self, creds: &Credentials, env_id: &str) -> Result<(), DispatchError> {
        (**self).trigger_envelope(creds, env_id).await
    }
    async fn lists(&self, creds: &Credentials) -> Result<Vec<RemoteList>, DispatchError> {
        (**self).lists(creds).await
    }
    async fn create_list(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        (**self).create_list(creds, name).await
    }
    async fn campaigns(&self, creds: &Credentials) -> Result<Vec<RemoteCampaign>, DispatchError> {
        (**self).campaigns(creds).await
    }
    async fn create_campaign(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        (**self).create_campaign(creds, name).await
    }
    async fn subscribe(
        &self,
        creds: &Credentials,
        list_id: &str,
        email: &str,
    ) -> Result<(), DispatchError> {
        (**self).subscribe(creds, list_id, email).await
    }
}

/// Numeric id or code that may arrive as a number or a string.
pub(crate) fn loose_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Split a decoded response into its payload or a `RemoteRejected`.
pub(crate) fn check_response(body: Value) -> Result<Value, DispatchError> {
    let response = body.get("response").and_then(Value::as_str).unwrap_or_default();
    if response == RESPONSE_OK {
        return Ok(body);
    }
    let code = body
        .get("code")
        .and_then(loose_string)
        .and_then(|c| c.parse::<i64>().ok());
    let message = ["message", "error", "msg"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or("remote returned an error response")
        .to_string();
    Err(DispatchError::RemoteRejected { code, message })
}

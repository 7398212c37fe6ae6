// src/remote/http.rs
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    check_response, loose_string, DeliveryApi, EnvelopeRequest, RemoteCampaign, RemoteList,
};
use crate::config::Credentials;
use crate::error::DispatchError;
use crate::logging::{content_digest, redact, SECRET_MASK};

pub const DELIVERY_ENDPOINT: &str = "api_delivery";
pub const CONTACT_ENDPOINT: &str = "api_contact";
pub const LIST_ENDPOINT: &str = "api_list";
pub const CAMPAIGN_ENDPOINT: &str = "api_campaign";

/// 2-legged OAuth 1.0 `PLAINTEXT` signature: `enc(consumer_secret)&` with an
/// empty token secret.
pub fn plaintext_signature(secret: &str) -> String {
    format!("{}&", urlencoding::encode(secret))
}

/// `Authorization` header value for one request.
pub fn oauth_header(creds: &Credentials, nonce: &str, timestamp: i64) -> String {
    let params = [
        ("oauth_consumer_key", creds.key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature", plaintext_signature(&creds.secret)),
        ("oauth_signature_method", "PLAINTEXT".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_version", "1.0".to_string()),
    ];
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {joined}")
}

fn new_nonce() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}

#[derive(Clone)]
pub struct HttpDeliveryApi {
    base_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl HttpDeliveryApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Retries apply to reads only; writes are sent once.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn send_once(
        &self,
        creds: &Credentials,
        method: Method,
        endpoint: &str,
        fields: &[(&str, String)],
    ) -> Result<Value, DispatchError> {
        let auth = oauth_header(creds, &new_nonce(), chrono::Utc::now().timestamp());
        let mut req = self
            .client
            .request(method.clone(), self.url(endpoint))
            .timeout(self.timeout)
            .header(reqwest::header::AUTHORIZATION, auth);
        req = if method == Method::GET {
            req.query(fields)
        } else {
            req.form(fields)
        };

        debug!(
            target: "remote",
            %method,
            endpoint,
            key = %creds.key,
            secret = SECRET_MASK,
            "calling remote API"
        );

        let rsp = req
            .send()
            .await
            .map_err(|e| transport(endpoint, &e.to_string(), &creds.secret))?;
        let status = rsp.status();
        let text = rsp
            .text()
            .await
            .map_err(|e| transport(endpoint, &e.to_string(), &creds.secret))?;

        match serde_json::from_str::<Value>(text.trim()) {
            Ok(body) => check_response(body),
            Err(_) => Err(DispatchError::TransportUnavailable(format!(
                "{endpoint}: HTTP {status} with non-JSON body"
            ))),
        }
    }

    async fn get(&self, creds: &Credentials, endpoint: &str) -> Result<Value, DispatchError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(creds, Method::GET, endpoint, &[]).await {
                Err(DispatchError::TransportUnavailable(msg)) if attempt < self.max_retries => {
                    warn!(target: "remote", endpoint, attempt, error = %msg, "retrying read");
                    tokio::time::sleep(Duration::from_millis(250u64 << (attempt - 1))).await;
                }
                other => return other,
            }
        }
    }
}

/// Transport failure with the API secret masked out of the message.
fn transport(endpoint: &str, detail: &str, secret: &str) -> DispatchError {
    DispatchError::TransportUnavailable(redact(&format!("{endpoint}: {detail}"), secret))
}

fn missing(field: &str) -> DispatchError {
    DispatchError::RemoteRejected {
        code: None,
        message: format!("response is missing {field}"),
    }
}

#[async_trait]
impl DeliveryApi for HttpDeliveryApi {
    async fn create_envelope(
        &self,
        creds: &Credentials,
        request: &EnvelopeRequest,
    ) -> Result<Option<String>, DispatchError> {
        debug!(
            target: "remote",
            name = %request.name,
            language = %request.language,
            creativity_len = request.creativity.len(),
            creativity_digest = %content_digest(&request.creativity),
            "creating envelope"
        );
        let body = self
            .send_once(creds, Method::POST, DELIVERY_ENDPOINT, &request.form_fields())
            .await?;
        Ok(body.pointer("/data/envId").and_then(loose_string))
    }

    async fn trigger_envelope(&self, creds: &Credentials, env_id: &str) -> Result<(), DispatchError> {
        let fields = [("envId", env_id.to_string()), ("date", "now".to_string())];
        self.send_once(creds, Method::PUT, DELIVERY_ENDPOINT, &fields)
            .await
            .map(|_| ())
    }

    async fn lists(&self, creds: &Credentials) -> Result<Vec<RemoteList>, DispatchError> {
        let body = self.get(creds, LIST_ENDPOINT).await?;
        Ok(body
            .get("lists")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|l| {
                        Some(RemoteList {
                            id: l.get("id").and_then(loose_string)?,
                            name: l.get("name").and_then(Value::as_str)?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_list(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        let body = self
            .send_once(creds, Method::POST, LIST_ENDPOINT, &[("listName", name.to_string())])
            .await?;
        body.get("listId")
            .or_else(|| body.pointer("/data/listId"))
            .and_then(loose_string)
            .ok_or_else(|| missing("listId"))
    }

    async fn campaigns(&self, creds: &Credentials) -> Result<Vec<RemoteCampaign>, DispatchError> {
        let body = self.get(creds, CAMPAIGN_ENDPOINT).await?;
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        Some(RemoteCampaign {
                            id: c.get("id").and_then(loose_string)?,
                            name: c.get("campaignName").and_then(Value::as_str)?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_campaign(&self, creds: &Credentials, name: &str) -> Result<String, DispatchError> {
        let body = self
            .send_once(creds, Method::POST, CAMPAIGN_ENDPOINT, &[("name", name.to_string())])
            .await?;
        body.pointer("/data/camId")
            .and_then(loose_string)
            .ok_or_else(|| missing("camId"))
    }

    async fn subscribe(
        &self,
        creds: &Credentials,
        list_id: &str,
        email: &str,
    ) -> Result<(), DispatchError> {
        let fields = [("listId", list_id.to_string()), ("email", email.to_string())];
        self.send_once(creds, Method::POST, CONTACT_ENDPOINT, &fields)
            .await
            .map(|_| ())
    }
}

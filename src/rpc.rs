//! Transport-agnostic contract for the single `Allow` RPC.
//!
//! An endpoint (gRPC, HTTP, anything) owns the wire encoding; this module
//! owns validation, the status vocabulary, and the mapping from engine
//! errors onto it, so every transport reports identically.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::service::QuotaService;

/// Request for tokens from one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRequest {
    pub namespace: String,
    pub name: String,

    /// Defaults to one token. Zero is malformed; negative values return
    /// tokens and are allowed through.
    #[serde(default = "default_num_tokens")]
    pub num_tokens_requested: i64,

    /// Caller's patience in milliseconds. Negative means "use the service
    /// default"; zero means unbounded.
    #[serde(default = "default_max_wait_override")]
    pub max_wait_millis_override: i64,
}

fn default_num_tokens() -> i64 {
    1
}

fn default_max_wait_override() -> i64 {
    -1
}

impl AllowRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            num_tokens_requested: default_num_tokens(),
            max_wait_millis_override: default_max_wait_override(),
        }
    }

    fn invalid(&self) -> bool {
        // Negative token counts are allowed.
        self.namespace.is_empty() || self.name.is_empty() || self.num_tokens_requested == 0
    }
}

/// Outcome vocabulary shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Granted; tokens are usable now.
    Ok,
    /// Granted; the client should sleep `wait_millis` first.
    OkWait,
    /// No such bucket, policy rejection, or exhausted wait budget.
    Rejected,
    /// Malformed request or unclassified internal error.
    Failed,
}

/// Response to an [`AllowRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowResponse {
    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_tokens_granted: Option<i64>,

    /// Milliseconds. Populated only for [`Status::Ok`] and
    /// [`Status::OkWait`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_millis: Option<i64>,
}

impl AllowResponse {
    fn status_only(status: Status) -> Self {
        Self { status, num_tokens_granted: None, wait_millis: None }
    }
}

/// Validate `req`, arbitrate through `service`, and classify the outcome.
pub async fn handle_allow(service: &QuotaService, req: AllowRequest) -> AllowResponse {
    if req.invalid() {
        warn!(namespace = %req.namespace, name = %req.name, "invalid allow request");
        return AllowResponse::status_only(Status::Failed);
    }

    let max_wait_override = if req.max_wait_millis_override < 0 {
        None
    } else {
        Some(Duration::from_millis(req.max_wait_millis_override as u64))
    };

    match service
        .allow(&req.namespace, &req.name, req.num_tokens_requested, max_wait_override)
        .await
    {
        Ok(grant) => {
            let wait_millis = grant.wait.as_millis() as i64;
            AllowResponse {
                status: if wait_millis > 0 { Status::OkWait } else { Status::Ok },
                num_tokens_granted: Some(grant.tokens),
                wait_millis: Some(wait_millis),
            }
        }
        Err(e) if e.is_no_such_bucket() || e.is_timed_out() || e.is_rejected() => {
            AllowResponse::status_only(Status::Rejected)
        }
        Err(e) => {
            error!(error = %e, "allow failed");
            AllowResponse::status_only(Status::Failed)
        }
    }
}

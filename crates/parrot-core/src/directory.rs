//! Directory service - resolves a bare identity to its public profile

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AgentError, AgentResult};
use crate::types::{Contact, Identity, PublicKey};

/// Default directory endpoint
pub const DEFAULT_DIRECTORY_URL: &str = "https://api.threema.ch";

/// Lookup of public contact profiles
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch the profile of `identity`. The returned contact has no nickname.
    async fn fetch_contact(&self, identity: &Identity) -> AgentResult<Contact>;
}

/// REST directory client (`GET {base}/identity/{ID}`)
pub struct HttpDirectory {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    identity: String,
    public_key: String,
}

impl HttpDirectory {
    /// Create a client for `base_url` with a 10 second request timeout
    pub fn new(base_url: &str) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgentError::Config(format!("directory client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url_for(&self, identity: &Identity) -> String {
        format!("{}/identity/{}", self.base_url, identity)
    }
}

/// Turn a directory response body into a contact
fn parse_identity_response(requested: &Identity, body: &[u8]) -> AgentResult<Contact> {
    let fail = |reason: String| AgentError::Directory {
        identity: requested.to_string(),
        reason,
    };

    let response: IdentityResponse =
        serde_json::from_slice(body).map_err(|e| fail(format!("malformed response: {}", e)))?;
    let identity = Identity::parse(&response.identity).map_err(|e| fail(e.to_string()))?;
    if identity != *requested {
        return Err(fail(format!("directory answered for {}", identity)));
    }
    let key_bytes = base64::engine::general_purpose::STANDARD
        .decode(&response.public_key)
        .map_err(|e| fail(format!("bad public key encoding: {}", e)))?;
    let public_key = PublicKey::from_slice(&key_bytes).map_err(|e| fail(e.to_string()))?;

    Ok(Contact::new(identity, public_key))
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn fetch_contact(&self, identity: &Identity) -> AgentResult<Contact> {
        let url = self.url_for(identity);
        debug!(%identity, %url, "Fetching contact from directory");

        let fail = |reason: String| AgentError::Directory {
            identity: identity.to_string(),
            reason,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status)));
        }
        let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;

        parse_identity_response(identity, &body)
    }
}

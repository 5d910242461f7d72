//! IPFS node HTTP API client (`/api/v0`).
//!
//! Every endpoint is a POST; arguments travel in the query string.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use pinvault_core::config::StorageConfig;
use pinvault_core::{PinvaultError, PinvaultResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::content::ContentStore;
use crate::health::StoreStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub cumulative_size: u64,
    pub num_links: u64,
    pub block_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub peer_id: String,
    pub agent_version: String,
    pub version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddLine {
    hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatResponse {
    #[serde(default)]
    cumulative_size: u64,
    #[serde(default)]
    num_links: u64,
    #[serde(default)]
    block_size: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinLsResponse {
    #[serde(default)]
    keys: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "AgentVersion", default)]
    agent_version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionResponse {
    version: String,
    #[serde(default)]
    commit: String,
}

#[derive(Clone)]
pub struct IpfsClient {
    base: String,
    gateway: String,
    client: Client,
}

impl IpfsClient {
    pub fn new(api_url: &str, gateway: &str, timeout: Duration) -> PinvaultResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PinvaultError::content_store(format!("building HTTP client: {e}")))?;
        let mut gateway = gateway.to_string();
        if !gateway.ends_with('/') {
            gateway.push('/');
        }
        Ok(IpfsClient {
            base: format!("{}/api/v0", api_url.trim_end_matches('/')),
            gateway,
            client,
        })
    }

    /// Build from config. Plaintext HTTP to a non-loopback node is refused
    /// when `enforce_tls` is set and warned about otherwise.
    pub fn from_config(cfg: &StorageConfig) -> PinvaultResult<Self> {
        if cfg.api_url.starts_with("http://") && !is_loopback(&cfg.api_url) {
            if cfg.enforce_tls {
                return Err(PinvaultError::Config(format!(
                    "IPFS API uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS endpoint or set storage.enforce_tls = false.",
                    cfg.api_url
                )));
            }
            warn!(
                endpoint = %cfg.api_url,
                "IPFS API uses plaintext HTTP to a remote host"
            );
        }
        Self::new(
            &cfg.api_url,
            &cfg.gateway_url,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    async fn post(&self, op: &str, query: &[(&str, &str)]) -> PinvaultResult<Response> {
        let url = format!("{}/{}", self.base, op);
        let resp = self
            .client
            .post(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| PinvaultError::content_store(format!("{op}: {e}")))?;
        check_status(op, resp).await
    }

    pub async fn object_stat(&self, cid: &str) -> PinvaultResult<ObjectStat> {
        let stat: StatResponse = self
            .post("object/stat", &[("arg", cid)])
            .await?
            .json()
            .await
            .map_err(|e| PinvaultError::content_store(format!("object/stat: {e}")))?;
        Ok(ObjectStat {
            cumulative_size: stat.cumulative_size,
            num_links: stat.num_links,
            block_size: stat.block_size,
        })
    }

    /// Recursively pinned content ids on the node.
    pub async fn list_pins(&self) -> PinvaultResult<Vec<String>> {
        let pins: PinLsResponse = self
            .post("pin/ls", &[("type", "recursive")])
            .await?
            .json()
            .await
            .map_err(|e| PinvaultError::content_store(format!("pin/ls: {e}")))?;
        let mut keys: Vec<String> = pins.keys.into_keys().collect();
        keys.sort();
        Ok(keys)
    }

    pub async fn node_info(&self) -> PinvaultResult<NodeInfo> {
        let id: IdResponse = self
            .post("id", &[])
            .await?
            .json()
            .await
            .map_err(|e| PinvaultError::content_store(format!("id: {e}")))?;
        let version: VersionResponse = self
            .post("version", &[])
            .await?
            .json()
            .await
            .map_err(|e| PinvaultError::content_store(format!("version: {e}")))?;
        let version = if version.commit.is_empty() {
            version.version
        } else {
            format!("{}-{}", version.version, version.commit)
        };
        Ok(NodeInfo {
            peer_id: id.id,
            agent_version: id.agent_version,
            version,
        })
    }

    pub async fn check_connection(&self) -> bool {
        match self.post("version", &[]).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "IPFS node not reachable");
                false
            }
        }
    }

    pub fn metadata_url(&self, metadata_id: &str) -> String {
        format!("{}{}", self.gateway, metadata_id)
    }
}

#[async_trait]
impl ContentStore for IpfsClient {
    async fn add(&self, bytes: Vec<u8>, name: &str) -> PinvaultResult<String> {
        let url = format!("{}/add", self.base);
        let len = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(name.to_string()));
        let resp = self
            .client
            .post(&url)
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| PinvaultError::content_store(format!("add: {e}")))?;
        let body = check_status("add", resp)
            .await?
            .text()
            .await
            .map_err(|e| PinvaultError::content_store(format!("add: {e}")))?;
        let cid = parse_add_response(&body)?;
        debug!(cid = %cid, bytes = len, "added to IPFS");
        Ok(cid)
    }

    async fn cat(&self, content_id: &str) -> PinvaultResult<Vec<u8>> {
        let bytes = self
            .post("cat", &[("arg", content_id)])
            .await?
            .bytes()
            .await
            .map_err(|e| PinvaultError::content_store(format!("cat {content_id}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn pin(&self, content_id: &str) -> PinvaultResult<()> {
        self.post("pin/add", &[("arg", content_id)]).await.map(|_| ())
    }

    async fn unpin(&self, content_id: &str) -> PinvaultResult<()> {
        self.post("pin/rm", &[("arg", content_id)]).await.map(|_| ())
    }

    async fn status(&self) -> PinvaultResult<StoreStatus> {
        let info = self.node_info().await?;
        Ok(StoreStatus {
            backend: "ipfs",
            detail: format!(
                "peer {} ({}, version {})",
                info.peer_id, info.agent_version, info.version
            ),
        })
    }

    fn gateway_url(&self, content_id: &str) -> Option<String> {
        Some(format!("{}{}", self.gateway, content_id))
    }
}

async fn check_status(op: &str, resp: Response) -> PinvaultResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let t = resp.text().await.unwrap_or_default();
        Err(PinvaultError::content_store(format!(
            "{op} failed {status} {}",
            t.trim()
        )))
    }
}

/// `add` streams one JSON object per line (progress, then one per added
/// object); the last line describes the root.
pub(crate) fn parse_add_response(body: &str) -> PinvaultResult<String> {
    let last = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| PinvaultError::content_store("add: empty response"))?;
    let line: AddLine = serde_json::from_str(last)
        .map_err(|e| PinvaultError::content_store(format!("add: unexpected response {last}: {e}")))?;
    Ok(line.hash)
}

fn is_loopback(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default();
    host.starts_with("127.") || host.starts_with("localhost") || host.starts_with("[::1]")
}

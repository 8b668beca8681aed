//! Remote feed access.

use crate::config::SyncConfig;
use crate::db::RemoteRow;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Where a feed lives and the TLS material needed to reach it
#[derive(Clone, Debug)]
pub struct FeedSource {
    /// Manifest URL; unit URLs are resolved against it
    pub url: Url,
    /// PEM CA certificate trusted in addition to the system roots
    pub ca_cert: Option<String>,
    /// PEM client certificate followed by its private key
    pub client_cert: Option<String>,
}

impl FeedSource {
    /// Build from a stored remote
    pub fn from_remote(remote: &RemoteRow) -> Result<Self> {
        let url = Url::parse(&remote.url)
            .map_err(|e| Error::Feed(format!("invalid remote url '{}': {}", remote.url, e)))?;
        Ok(Self {
            url,
            ca_cert: remote.ca_cert.clone(),
            client_cert: remote.client_cert.clone(),
        })
    }

    /// URL of a unit listed in this feed's manifest
    pub fn unit_url(&self, relative_path: &str) -> Result<Url> {
        self.url.join(relative_path).map_err(|e| {
            Error::Feed(format!(
                "cannot resolve '{}' against '{}': {}",
                relative_path, self.url, e
            ))
        })
    }
}

/// Fetch primitive the sync engine pulls manifests and units through
#[async_trait]
pub trait RemoteFeed: Send + Sync + 'static {
    /// Fetch the full body at `url`, authenticating as `source` requires
    async fn fetch(&self, source: &FeedSource, url: &Url) -> Result<Vec<u8>>;
}

type TlsKey = (Option<String>, Option<String>);

/// HTTP(S) feed client
///
/// One `reqwest::Client` is built per distinct TLS configuration and reused.
/// Transient failures are retried with exponential backoff.
pub struct HttpFeed {
    config: SyncConfig,
    clients: Mutex<HashMap<TlsKey, reqwest::Client>>,
}

impl HttpFeed {
    /// Create a feed client using the sync settings
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, source: &FeedSource) -> Result<reqwest::Client> {
        let key = (source.ca_cert.clone(), source.client_cert.clone());
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.config.request_timeout)
            .user_agent(self.config.user_agent.clone());

        if let Some(ca) = &source.ca_cert {
            let certificate = reqwest::Certificate::from_pem(ca.as_bytes())
                .map_err(|e| Error::Feed(format!("invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(cert) = &source.client_cert {
            let identity = reqwest::Identity::from_pem(cert.as_bytes())
                .map_err(|e| Error::Feed(format!("invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Feed(format!("failed to build HTTP client: {}", e)))?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl RemoteFeed for HttpFeed {
    async fn fetch(&self, source: &FeedSource, url: &Url) -> Result<Vec<u8>> {
        let client = self.client_for(source)?;

        let body = with_retry(&self.config.retry, || {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response = client.get(url).send().await?.error_for_status()?;
                Ok::<_, Error>(response.bytes().await?.to_vec())
            }
        })
        .await?;

        tracing::debug!(url = %url, size = body.len(), "fetched from feed");
        Ok(body)
    }
}

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pdfview_core::{sanitize_relative, DocumentIndex, DocumentSource};
use tracing::debug;
use url::Url;

/// Fetches `documents/index.json` and `documents/<path>` relative to a base
/// URL.
pub struct HttpSource {
    documents: Url,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid base url {base_url:?}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let documents = base
            .join("documents/")
            .with_context(|| format!("invalid base url {base_url:?}"))?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .build();
        Ok(Self { documents, agent })
    }

    pub fn document_url(&self, path: &str) -> Result<Url> {
        let relative = sanitize_relative(path)?;
        let relative = relative
            .to_str()
            .ok_or_else(|| anyhow!("document path {path:?} is not UTF-8"))?;
        let url = self
            .documents
            .join(relative)
            .with_context(|| format!("invalid document path {path:?}"))?;
        if !url.as_str().starts_with(self.documents.as_str()) {
            return Err(anyhow!("document path {path:?} leaves the documents route"));
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || {
            debug!(%url, "GET");
            let response = agent
                .get(url.as_str())
                .call()
                .with_context(|| format!("GET {url} failed"))?;
            let mut body = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut body)
                .with_context(|| format!("failed to read body of {url}"))?;
            Ok(body)
        })
        .await
        .context("request task failed")?
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch_index(&self) -> Result<DocumentIndex> {
        let url = self.document_url("index.json")?;
        let body = self.get(url).await?;
        serde_json::from_slice(&body).context("failed to decode document index")
    }

    async fn fetch_document(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.document_url(path)?;
        self.get(url).await
    }
}

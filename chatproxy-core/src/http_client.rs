use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};

use crate::config::HttpCfg;
use crate::decode::ByteStream;
use crate::error::{ChatProxyError, CoreResult, map_upstream_error};

/// Thin wrapper around reqwest::Client with defaults and helpers.
///
/// The request timeout applies only to non-streaming calls; a streaming body
/// has no deadline and is bounded by caller cancellation instead.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    request_timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_config(&HttpCfg::default())
    }

    pub fn from_config(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(cap) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(cap);
        }
        let inner = builder
            .build()
            .map_err(|e| ChatProxyError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
            user_agent: "chatproxy/0.1".to_string(),
        })
    }

    /// POST JSON, expect a JSON reply. Non-2xx maps through the upstream
    /// error taxonomy.
    pub async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> CoreResult<R> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .timeout(self.request_timeout)
            .header("User-Agent", &self.user_agent);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ChatProxyError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_upstream_error(Some(status), &text));
        }

        resp.json::<R>().await.map_err(|e| ChatProxyError::Upstream {
            status: status.as_u16(),
            message: format!("json decode error: {e}"),
        })
    }

    /// POST JSON and return the raw response byte stream once the call is
    /// established. Establishment failures are mapped before any bytes flow;
    /// after that point the stream only carries transport errors.
    pub async fn post_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> CoreResult<ByteStream> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ChatProxyError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_upstream_error(Some(status), &text));
        }

        let stream = resp
            .bytes_stream()
            .map_err(|e| ChatProxyError::Network(e.to_string()));
        Ok(Box::pin(stream))
    }
}

//! HTTP transport for the chat API.

use std::time::Duration;

use async_trait::async_trait;
use chat_core::config::{Config, ProxyAuth};
use chat_stream::StreamResponse;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy, RequestBuilder};

use crate::error::{ClientError, Result};
use crate::transport::{ChatRequest, ChatResponse, ChatTransport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn apply_proxy_auth(proxy: Proxy, auth: Option<&ProxyAuth>) -> Proxy {
    let Some(auth) = auth else {
        return proxy;
    };
    if auth.username.is_empty() {
        return proxy;
    }
    proxy.basic_auth(&auth.username, &auth.password)
}

/// Posts requests to `{api_base}{chat_path}` and `{api_base}{stream_path}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    chat_url: String,
    stream_url: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: Self::build_http_client(config)?,
            chat_url: config.chat_url(),
            stream_url: config.stream_url(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }

    fn build_http_client(config: &Config) -> Result<Client> {
        let mut builder = Client::builder()
            .default_headers(Self::default_headers())
            .connect_timeout(CONNECT_TIMEOUT);
        if !config.http_proxy.is_empty() {
            let proxy = Proxy::http(&config.http_proxy)
                .map_err(|e| ClientError::Config(format!("invalid http_proxy: {e}")))?;
            builder = builder.proxy(apply_proxy_auth(proxy, config.http_proxy_auth.as_ref()));
        }
        if !config.https_proxy.is_empty() {
            let proxy = Proxy::https(&config.https_proxy)
                .map_err(|e| ClientError::Config(format!("invalid https_proxy: {e}")))?;
            builder = builder.proxy(apply_proxy_auth(proxy, config.https_proxy_auth.as_ref()));
        }
        builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("ragchat/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    fn post(&self, url: &str, request: &ChatRequest) -> RequestBuilder {
        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        log::info!("Sending POST request to {}", self.chat_url);

        let mut builder = self
            .post(&self.chat_url, request)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Chat request failed: HTTP {}: {}", status, body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<ChatResponse>().await?)
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<StreamResponse> {
        log::info!("Opening stream at {}", self.stream_url);

        let response = self
            .post(&self.stream_url, request)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?;
        log::debug!("Stream response status: {}", response.status());

        Ok(StreamResponse::from_reqwest(response))
    }
}

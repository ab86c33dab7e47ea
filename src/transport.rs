use crate::config::USER_AGENT;
use crate::error::FetchError;
use anyhow::{Context, Result};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// One completed HTTP exchange, before any status or content checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network seam. A single implementation is shared by every concurrent
/// request of a run, so implementations hold one connection pool.
pub trait Transport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
        cookie: Option<&str>,
    ) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;

    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, FetchError>> + Send;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse, FetchError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        cookie: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.post(url).json(body);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        Self::read(response).await
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }
}

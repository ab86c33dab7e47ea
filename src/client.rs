use crate::config::{Config, EXPECTED_CONTENT_TYPE};
use crate::error::FetchError;
use crate::retry::Retrier;
use crate::stats::RunStats;
use crate::transport::{HttpResponse, Transport};
use serde_json::Value;
use std::sync::Arc;

/// Which content types a successful response may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeCheck {
    /// The header must equal this value exactly
    Exact(&'static str),
    Any,
}

impl ContentTypeCheck {
    pub fn paginated_api() -> Self {
        ContentTypeCheck::Exact(EXPECTED_CONTENT_TYPE)
    }

    fn accepts(&self, content_type: Option<&str>) -> bool {
        match self {
            ContentTypeCheck::Exact(expected) => content_type == Some(*expected),
            ContentTypeCheck::Any => true,
        }
    }
}

/// Transport, retrier and run configuration bundled for the pipelines.
pub struct ApiClient<T> {
    transport: T,
    config: Arc<Config>,
    retrier: Retrier,
    stats: Arc<RunStats>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, config: Arc<Config>, stats: Arc<RunStats>) -> Self {
        let retrier = Retrier::new(config.retry, Arc::clone(&stats));
        Self {
            transport,
            config,
            retrier,
            stats,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POSTs `payload` and decodes the JSON body. `None` means the request was
    /// skipped (non-success, wrong content type, undecodable, or retries spent).
    pub async fn post_json(
        &self,
        label: &str,
        url: &str,
        payload: &Value,
        check: ContentTypeCheck,
    ) -> Option<Value> {
        let cookie = self.config.auth_cookie();
        self.retrier
            .run(label, || async {
                let response = self
                    .transport
                    .post_json(url, payload, cookie.as_deref())
                    .await?;
                decode_json(response, check)
            })
            .await
    }

    /// GETs a page body as text, for HTML scraping
    pub async fn get_text(&self, label: &str, url: &str) -> Option<String> {
        self.retrier
            .run(label, || async {
                let response = self.transport.get(url).await?;
                if !response.is_success() {
                    return Err(FetchError::Status(response.status));
                }
                Ok(response.body)
            })
            .await
    }
}

fn decode_json(response: HttpResponse, check: ContentTypeCheck) -> Result<Value, FetchError> {
    if !response.is_success() {
        return Err(FetchError::Status(response.status));
    }
    if !check.accepts(response.content_type.as_deref()) {
        return Err(FetchError::ContentType(response.content_type));
    }
    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
}

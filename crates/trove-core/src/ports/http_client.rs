//! HTTP client port definition.

use async_trait::async_trait;

use crate::errors::FetchError;

/// A fetched response with enough context for the callers' branching.
///
/// Redirects are surfaced rather than followed transparently: a redirect
/// on the owned-games JSON endpoint specifically means "not logged in",
/// which would be indistinguishable after auto-following.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text. Empty for HEAD requests.
    pub body: String,
    /// The URL the response actually came from.
    pub final_url: String,
    /// Whether any redirect occurred while fetching.
    pub was_redirected: bool,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// `Content-Length` header, if present and parseable.
    pub content_length: Option<u64>,
    /// `Content-Disposition` header, if present.
    pub content_disposition: Option<String>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Port for cookie-authenticated HTTP access to the store.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// GET a page with the session cookie attached.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;

    /// HEAD a URL: headers only, no body. Used to learn a download's
    /// MIME type, file name, and byte length without fetching the
    /// payload twice.
    async fn head(&self, url: &str) -> Result<HttpResponse, FetchError>;

    /// POST a form with the session cookie attached.
    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<HttpResponse, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let mut response = HttpResponse {
            status: 200,
            final_url: "https://itch.io".to_string(),
            ..Default::default()
        };
        assert!(response.is_success());
        response.status = 302;
        assert!(!response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }
}

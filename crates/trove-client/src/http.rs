//! Reqwest-backed implementation of the HTTP client port.
//!
//! Redirects are NOT followed automatically: a redirect on an
//! authenticated endpoint is a signal (expired session), and following
//! it would erase the distinction between "not logged in" and whatever
//! page the redirect lands on.

use async_trait::async_trait;

use trove_core::{FetchError, HttpClientPort, HttpResponse};

use crate::config::ClientConfig;

/// Production HTTP client using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
    session_cookie: Option<String>,
}

impl ReqwestClient {
    /// Create a new reqwest client with the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            session_cookie: config.session_cookie.clone(),
        })
    }

    fn apply_cookie(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => request.header("Cookie", cookie),
            None => request,
        }
    }

    async fn into_response(
        response: reqwest::Response,
        requested_url: &str,
    ) -> Result<HttpResponse, FetchError> {
        let status = response.status().as_u16();
        let was_redirected = response.status().is_redirection();

        // With redirects disabled, the target URL lives in Location
        let final_url = if was_redirected {
            response
                .headers()
                .get("Location")
                .and_then(|h| h.to_str().ok())
                .map_or_else(|| requested_url.to_string(), ToString::to_string)
        } else {
            requested_url.to_string()
        };

        let content_type = header_string(&response, "Content-Type");
        let content_disposition = header_string(&response, "Content-Disposition");
        let content_length = header_string(&response, "Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            body,
            final_url,
            was_redirected,
            content_type,
            content_length,
            content_disposition,
        })
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string)
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        return FetchError::Timeout;
    }
    match e.status() {
        Some(status) => FetchError::network_with_status(e.to_string(), status.as_u16()),
        None => FetchError::network(e.to_string()),
    }
}

#[async_trait]
impl HttpClientPort for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let request = self.apply_cookie(self.client.get(url));
        let response = request.send().await.map_err(map_reqwest_error)?;
        Self::into_response(response, url).await
    }

    async fn head(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let request = self.apply_cookie(self.client.head(url));
        let response = request.send().await.map_err(map_reqwest_error)?;
        Self::into_response(response, url).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<HttpResponse, FetchError> {
        let request = self.apply_cookie(self.client.post(url)).form(form);
        let response = request.send().await.map_err(map_reqwest_error)?;
        Self::into_response(response, url).await
    }
}

// ============================================================================
// Fake client for testing
// ============================================================================

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned reply for one URL pattern.
    #[derive(Clone)]
    pub enum CannedReply {
        /// Return this response.
        Respond(HttpResponse),
        /// Fail with this error.
        Fail(FetchError),
        /// Fail `failures` times, then return the response.
        FailThenRespond {
            failures: u32,
            error: FetchError,
            response: HttpResponse,
        },
    }

    /// A fake HTTP client that returns canned responses by URL substring.
    #[derive(Default)]
    pub struct FakeHttpClient {
        replies: Mutex<HashMap<String, CannedReply>>,
        counters: Mutex<HashMap<String, u32>>,
        /// Every URL fetched, in order, across get/head/post.
        pub log: Mutex<Vec<String>>,
    }

    impl FakeHttpClient {
        /// Create an empty fake.
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a canned reply for URLs containing `pattern`.
        pub fn with_reply(self, pattern: &str, reply: CannedReply) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(pattern.to_string(), reply);
            self
        }

        /// Shorthand: a 200 response with the given body.
        pub fn with_body(self, pattern: &str, body: &str) -> Self {
            self.with_reply(
                pattern,
                CannedReply::Respond(HttpResponse {
                    status: 200,
                    body: body.to_string(),
                    final_url: pattern.to_string(),
                    ..Default::default()
                }),
            )
        }

        fn reply_for(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.log.lock().unwrap().push(url.to_string());

            // Longest matching pattern wins, so overlapping patterns
            // ("store" vs "store/download_url") resolve deterministically
            let replies = self.replies.lock().unwrap();
            let entry = replies
                .iter()
                .filter(|(pattern, _)| url.contains(pattern.as_str()))
                .max_by_key(|(pattern, _)| pattern.len());

            let Some((pattern, reply)) = entry else {
                return Err(FetchError::network_with_status(
                    format!("no canned reply for {url}"),
                    404,
                ));
            };

            match reply {
                CannedReply::Respond(response) => Ok(response.clone()),
                CannedReply::Fail(error) => Err(error.clone()),
                CannedReply::FailThenRespond {
                    failures,
                    error,
                    response,
                } => {
                    let mut counters = self.counters.lock().unwrap();
                    let seen = counters.entry(pattern.clone()).or_insert(0);
                    let attempt = *seen;
                    *seen += 1;
                    if attempt < *failures {
                        Err(error.clone())
                    } else {
                        Ok(response.clone())
                    }
                }
            }
        }
    }

    #[async_trait]
    impl HttpClientPort for FakeHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.reply_for(url)
        }

        async fn head(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.reply_for(url)
        }

        async fn post_form(
            &self,
            url: &str,
            _form: &[(String, String)],
        ) -> Result<HttpResponse, FetchError> {
            self.reply_for(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        let client = ReqwestClient::new(&ClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn fake_returns_canned_body() {
        let fake = FakeHttpClient::new().with_body("store", "<html>store page</html>");
        let response = fake.get("https://dev.itch.io/store").await.unwrap();
        assert!(response.is_success());
        assert!(response.body.contains("store page"));
    }

    #[tokio::test]
    async fn fake_fails_then_responds() {
        let fake = FakeHttpClient::new().with_reply(
            "flaky",
            CannedReply::FailThenRespond {
                failures: 2,
                error: FetchError::network("reset"),
                response: HttpResponse {
                    status: 200,
                    body: "ok".to_string(),
                    ..Default::default()
                },
            },
        );

        assert!(fake.get("https://x/flaky").await.is_err());
        assert!(fake.get("https://x/flaky").await.is_err());
        assert!(fake.get("https://x/flaky").await.is_ok());
    }
}

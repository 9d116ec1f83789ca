//! Download-URL resolution.
//!
//! The store offers three different paths to a game's downloads, and
//! which one applies cannot be known up front:
//!
//! 1. purchased games embed "ownership reason" rows with direct links,
//! 2. free games with a direct button use the store page itself,
//! 3. "pay what you want" games hand out a temporary signed URL in
//!    exchange for a CSRF-tokened POST.
//!
//! A denied donation-gated request ("you must buy this game") is a
//! first-class outcome here, never an error.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use trove_core::{DownloadPageInfo, FetchError, GameRecord, HttpClientPort, OwnershipRow, PageParser};

/// Outcome of resolving a game's download page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedAccess {
    /// Downloads are reachable through this page.
    Granted(DownloadPageInfo),
    /// The game must be bought first.
    Denied,
}

/// Metadata learned about a download URL without fetching the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    /// MIME type reported by the server.
    pub mime_type: Option<String>,
    /// File name from `Content-Disposition`, when present.
    pub file_name: Option<String>,
    /// Byte length, when the server reported one.
    pub size: Option<u64>,
}

/// Shape of the `download_url` JSON reply.
#[derive(Debug, Deserialize)]
struct DownloadUrlReply {
    url: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Resolves the authoritative (often temporary) download page for a game.
pub struct DownloadUrlResolver {
    http: Arc<dyn HttpClientPort>,
    parser: Arc<dyn PageParser>,
}

impl DownloadUrlResolver {
    /// Create a resolver over the given HTTP client and parser.
    pub fn new(http: Arc<dyn HttpClientPort>, parser: Arc<dyn PageParser>) -> Self {
        Self { http, parser }
    }

    /// Resolve the download page for a game by fetching its store page
    /// and walking the three access paths in order.
    pub async fn resolve(&self, game: &GameRecord) -> Result<ResolvedAccess, FetchError> {
        let response = self.http.get(&game.store_url).await?;
        if !response.is_success() {
            return Err(FetchError::network_with_status(
                format!("store page fetch failed for {}", game.store_url),
                response.status,
            ));
        }

        self.resolve_from_store_page(game, &response.body).await
    }

    /// Same as [`resolve`](Self::resolve) but over already-fetched HTML.
    pub async fn resolve_from_store_page(
        &self,
        game: &GameRecord,
        html: &str,
    ) -> Result<ResolvedAccess, FetchError> {
        // 1. Purchased: pick the highest-priced ownership row, ties by
        //    appearance order. Purchased download pages are permanent.
        let rows = self.parser.parse_ownership_rows(html);
        if let Some(row) = pick_purchased_row(&rows) {
            debug!(game = game.game_id, price = row.price_cents, "using purchased download page");
            return Ok(ResolvedAccess::Granted(
                DownloadPageInfo::new(&row.download_page_url)
                    .with_permanent(true)
                    .with_free(false),
            ));
        }

        // 2. Direct download button with no payment gate: the store page
        //    doubles as the download page.
        if let Some(page) = self.parser.resolve_download_url(html, &game.store_url) {
            return Ok(ResolvedAccess::Granted(page));
        }

        // 3. Donation-gated: POST for a temporary signed URL.
        self.request_donation_url(game, html).await
    }

    async fn request_donation_url(
        &self,
        game: &GameRecord,
        html: &str,
    ) -> Result<ResolvedAccess, FetchError> {
        let token = self
            .parser
            .parse_csrf_token(html)
            .ok_or_else(|| FetchError::parse("csrf token missing from store page"))?;

        let url = format!("{}/download_url", game.store_url.trim_end_matches('/'));
        let response = self
            .http
            .post_form(&url, &[("csrf_token".to_string(), token)])
            .await?;

        let reply: DownloadUrlReply = serde_json::from_str(&response.body)
            .map_err(|e| FetchError::parse(format!("download_url reply: {e}")))?;

        if let Some(signed_url) = reply.url {
            // Signed URLs expire; the page must never be cached as permanent
            return Ok(ResolvedAccess::Granted(
                DownloadPageInfo::new(signed_url).with_free(true),
            ));
        }

        if reply
            .errors
            .iter()
            .any(|e| e.to_lowercase().contains("must buy"))
        {
            return Ok(ResolvedAccess::Denied);
        }

        Err(FetchError::parse(format!(
            "download_url reply had neither url nor a recognized error: {:?}",
            reply.errors
        )))
    }

    /// Learn a download's MIME type, file name, and size from headers
    /// alone, so the payload is only ever fetched once.
    pub async fn fetch_file_metadata(&self, url: &str) -> Result<FileMetadata, FetchError> {
        let response = self.http.head(url).await?;
        if !response.is_success() {
            return Err(FetchError::network_with_status(
                format!("metadata fetch failed for {url}"),
                response.status,
            ));
        }

        Ok(FileMetadata {
            mime_type: response.content_type.clone(),
            file_name: response
                .content_disposition
                .as_deref()
                .and_then(parse_disposition_filename),
            size: response.content_length,
        })
    }

    /// Fetch the owned-games JSON feed. A redirect here means the
    /// session cookie is missing or expired, not a network problem.
    pub async fn fetch_purchase_feed(&self, feed_url: &str) -> Result<String, FetchError> {
        let response = self.http.get(feed_url).await?;
        if response.was_redirected {
            return Err(FetchError::NotLoggedIn);
        }
        if !response.is_success() {
            return Err(FetchError::network_with_status(
                format!("purchase feed fetch failed for {feed_url}"),
                response.status,
            ));
        }
        Ok(response.body)
    }
}

/// Highest price wins; ties broken by appearance order.
fn pick_purchased_row(rows: &[OwnershipRow]) -> Option<&OwnershipRow> {
    rows.iter()
        .enumerate()
        .max_by_key(|(index, row)| (row.price_cents, std::cmp::Reverse(*index)))
        .map(|(_, row)| row)
}

/// Pull the file name out of a `Content-Disposition` header.
///
/// Handles the quoted and unquoted `filename=` forms; the RFC 5987
/// `filename*=` form is not emitted by the store.
fn parse_disposition_filename(header: &str) -> Option<String> {
    let marker = "filename=";
    let start = header.find(marker)? + marker.len();
    let rest = header[start..].trim();
    let name = rest
        .strip_prefix('"')
        .map_or_else(
            || rest.split(';').next().unwrap_or(rest),
            |quoted| quoted.split('"').next().unwrap_or(quoted),
        )
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedReply, FakeHttpClient};
    use trove_core::{HttpResponse, UploadCandidate};

    /// Parser stub returning configured records regardless of HTML.
    #[derive(Default)]
    struct StubParser {
        ownership_rows: Vec<OwnershipRow>,
        download_url: Option<DownloadPageInfo>,
        csrf_token: Option<String>,
        candidates: Vec<UploadCandidate>,
    }

    impl PageParser for StubParser {
        fn parse_candidates(&self, _html: &str, _game_id: i64) -> Vec<UploadCandidate> {
            self.candidates.clone()
        }

        fn parse_game(&self, _html: &str, _url: &str) -> Option<GameRecord> {
            None
        }

        fn resolve_download_url(&self, _html: &str, _store_url: &str) -> Option<DownloadPageInfo> {
            self.download_url.clone()
        }

        fn parse_ownership_rows(&self, _html: &str) -> Vec<OwnershipRow> {
            self.ownership_rows.clone()
        }

        fn parse_csrf_token(&self, _html: &str) -> Option<String> {
            self.csrf_token.clone()
        }
    }

    fn game() -> GameRecord {
        GameRecord::new(1, "Game", "dev", "https://dev.itch.io/game")
    }

    fn resolver(http: FakeHttpClient, parser: StubParser) -> DownloadUrlResolver {
        DownloadUrlResolver::new(Arc::new(http), Arc::new(parser))
    }

    #[tokio::test]
    async fn purchased_rows_pick_highest_price_ties_by_order() {
        let rows = vec![
            OwnershipRow {
                download_page_url: "https://dev.itch.io/game/download/key1".to_string(),
                price_cents: 500,
            },
            OwnershipRow {
                download_page_url: "https://dev.itch.io/game/download/key2".to_string(),
                price_cents: 1000,
            },
            OwnershipRow {
                download_page_url: "https://dev.itch.io/game/download/key3".to_string(),
                price_cents: 1000,
            },
        ];
        assert_eq!(
            pick_purchased_row(&rows).unwrap().download_page_url,
            "https://dev.itch.io/game/download/key2"
        );

        let http = FakeHttpClient::new().with_body("dev.itch.io/game", "<html/>");
        let parser = StubParser {
            ownership_rows: rows,
            ..Default::default()
        };
        let access = resolver(http, parser).resolve(&game()).await.unwrap();
        match access {
            ResolvedAccess::Granted(page) => {
                assert!(page.is_permanent);
                assert!(page.url.ends_with("key2"));
            }
            ResolvedAccess::Denied => panic!("expected granted access"),
        }
    }

    #[tokio::test]
    async fn free_game_uses_store_page() {
        let http = FakeHttpClient::new().with_body("dev.itch.io/game", "<html/>");
        let parser = StubParser {
            download_url: Some(
                DownloadPageInfo::new("https://dev.itch.io/game")
                    .with_permanent(true)
                    .with_store_page(true)
                    .with_free(true),
            ),
            ..Default::default()
        };
        let access = resolver(http, parser).resolve(&game()).await.unwrap();
        match access {
            ResolvedAccess::Granted(page) => {
                assert!(page.is_store_page);
                assert!(page.is_permanent);
            }
            ResolvedAccess::Denied => panic!("expected granted access"),
        }
    }

    #[tokio::test]
    async fn donation_gated_post_yields_temporary_url() {
        let http = FakeHttpClient::new()
            .with_body("download_url", r#"{"url": "https://dl.itch.io/signed/abc"}"#)
            .with_body("dev.itch.io/game", "<html/>");
        let parser = StubParser {
            csrf_token: Some("tok".to_string()),
            ..Default::default()
        };
        let access = resolver(http, parser).resolve(&game()).await.unwrap();
        match access {
            ResolvedAccess::Granted(page) => {
                assert!(!page.is_permanent);
                assert!(page.is_free);
                assert_eq!(page.url, "https://dl.itch.io/signed/abc");
            }
            ResolvedAccess::Denied => panic!("expected granted access"),
        }
    }

    #[tokio::test]
    async fn must_buy_reply_is_denied_not_error() {
        let http = FakeHttpClient::new()
            .with_body(
                "download_url",
                r#"{"errors": ["you must buy this game to download"]}"#,
            )
            .with_body("dev.itch.io/game", "<html/>");
        let parser = StubParser {
            csrf_token: Some("tok".to_string()),
            ..Default::default()
        };
        let access = resolver(http, parser).resolve(&game()).await.unwrap();
        assert_eq!(access, ResolvedAccess::Denied);
    }

    #[tokio::test]
    async fn missing_csrf_token_is_parse_error() {
        let http = FakeHttpClient::new().with_body("dev.itch.io/game", "<html/>");
        let parser = StubParser::default();
        let err = resolver(http, parser).resolve(&game()).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }

    #[tokio::test]
    async fn purchase_feed_redirect_means_not_logged_in() {
        let http = FakeHttpClient::new().with_reply(
            "my-purchases",
            CannedReply::Respond(HttpResponse {
                status: 302,
                was_redirected: true,
                final_url: "https://itch.io/login".to_string(),
                ..Default::default()
            }),
        );
        let parser = StubParser::default();
        let err = resolver(http, parser)
            .fetch_purchase_feed("https://itch.io/my-purchases?format=json")
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotLoggedIn);
    }

    #[tokio::test]
    async fn metadata_from_head_headers() {
        let http = FakeHttpClient::new().with_reply(
            "cdn",
            CannedReply::Respond(HttpResponse {
                status: 200,
                content_type: Some("application/vnd.android.package-archive".to_string()),
                content_length: Some(14_680_064),
                content_disposition: Some("attachment; filename=\"game-1.2.apk\"".to_string()),
                ..Default::default()
            }),
        );
        let parser = StubParser::default();
        let meta = resolver(http, parser)
            .fetch_file_metadata("https://cdn.itch.io/file")
            .await
            .unwrap();
        assert_eq!(meta.file_name.as_deref(), Some("game-1.2.apk"));
        assert_eq!(meta.size, Some(14_680_064));
        assert_eq!(
            meta.mime_type.as_deref(),
            Some("application/vnd.android.package-archive")
        );
    }

    #[test]
    fn disposition_filename_forms() {
        assert_eq!(
            parse_disposition_filename("attachment; filename=\"a b.apk\""),
            Some("a b.apk".to_string())
        );
        assert_eq!(
            parse_disposition_filename("attachment; filename=plain.apk"),
            Some("plain.apk".to_string())
        );
        assert_eq!(
            parse_disposition_filename("attachment; filename=one.apk; size=3"),
            Some("one.apk".to_string())
        );
        assert_eq!(parse_disposition_filename("attachment"), None);
    }
}

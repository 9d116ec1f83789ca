//! Website record parser port definition.
//!
//! The parser turns fetched HTML into structured records. Its DOM
//! walking is infrastructure; the decision logic only ever sees the
//! returned records, which keeps the heuristics testable with canned
//! structured data instead of HTML fixtures.
//!
//! The upstream site has no documented schema; implementations treat
//! captured pages as golden inputs.

use crate::domain::{DownloadPageInfo, GameRecord, UploadCandidate};

/// One "ownership reason" row on a purchased game's store page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipRow {
    /// Direct link to the purchased download page.
    pub download_page_url: String,
    /// Price paid, in cents. Zero for claimed free purchases.
    pub price_cents: u32,
}

/// Port for extracting structured records from fetched pages.
///
/// All methods are pure functions over the given HTML snapshot.
pub trait PageParser: Send + Sync {
    /// Extract every selectable upload from a download or store page.
    /// An empty list means the page showed no download rows.
    fn parse_candidates(&self, html: &str, game_id: i64) -> Vec<UploadCandidate>;

    /// Extract the game record from a store page, if the page is one.
    fn parse_game(&self, html: &str, url: &str) -> Option<GameRecord>;

    /// Resolve the download page advertised by a store page: either the
    /// page itself (free games with a direct button) or a linked page.
    /// `None` when the page advertises no unpaid path.
    fn resolve_download_url(&self, html: &str, store_url: &str) -> Option<DownloadPageInfo>;

    /// Extract the "you own this" rows from a store page, in appearance
    /// order. Empty when the game was never purchased.
    fn parse_ownership_rows(&self, html: &str) -> Vec<OwnershipRow>;

    /// Extract the CSRF token embedded in the page, needed for the
    /// `download_url` POST on donation-gated games.
    fn parse_csrf_token(&self, html: &str) -> Option<String>;
}

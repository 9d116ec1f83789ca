//! Persisted store-listing records.

use serde::{Deserialize, Serialize};

use super::check::DownloadPageInfo;
use super::upload::Locale;

/// Stable identity for a store listing.
///
/// Upserted every time a store page is visited or a game is referenced by a
/// download; never deleted except via app data reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Stable numeric key scraped from the page.
    pub game_id: i64,
    /// Display name.
    pub name: String,
    /// Author/developer name.
    pub author_name: String,
    /// Canonical store page URL.
    pub store_url: String,
    /// Cached download page. Only present when the page is permanent,
    /// i.e. free games with direct download buttons; donation-gated URLs
    /// are temporary and must never be cached here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_page: Option<DownloadPageInfo>,
    /// Thumbnail image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// "Last updated" string exactly as rendered on the store page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<String>,
    /// Locale the store page was rendered in when scraped.
    pub locale: Locale,
}

impl GameRecord {
    /// Create a record with the required fields.
    pub fn new(
        game_id: i64,
        name: impl Into<String>,
        author_name: impl Into<String>,
        store_url: impl Into<String>,
    ) -> Self {
        Self {
            game_id,
            name: name.into(),
            author_name: author_name.into(),
            store_url: store_url.into(),
            download_page: None,
            thumbnail_url: None,
            last_updated_timestamp: None,
            locale: Locale::Unknown,
        }
    }

    /// Cache a download page on this record.
    ///
    /// Only permanent pages are kept; a temporary page is discarded so a
    /// stale signed URL can never be served from the cache.
    #[must_use]
    pub fn with_download_page(mut self, page: DownloadPageInfo) -> Self {
        if page.is_permanent {
            self.download_page = Some(page);
        }
        self
    }

    /// Set the thumbnail URL.
    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Set the "last updated" string.
    #[must_use]
    pub fn with_last_updated(mut self, timestamp: impl Into<String>) -> Self {
        self.last_updated_timestamp = Some(timestamp.into());
        self
    }

    /// Set the locale.
    #[must_use]
    pub fn with_locale(mut self, tag: impl Into<String>) -> Self {
        self.locale = Locale::Tag(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_download_page_is_not_cached() {
        let temporary = DownloadPageInfo::new("https://example.itch.io/g/download/abc123")
            .with_free(true);
        let game = GameRecord::new(1, "Game", "Author", "https://example.itch.io/g")
            .with_download_page(temporary);
        assert!(game.download_page.is_none());
    }

    #[test]
    fn permanent_download_page_is_cached() {
        let permanent = DownloadPageInfo::new("https://example.itch.io/g")
            .with_permanent(true)
            .with_store_page(true)
            .with_free(true);
        let game = GameRecord::new(1, "Game", "Author", "https://example.itch.io/g")
            .with_download_page(permanent);
        assert!(game.download_page.is_some());
    }
}

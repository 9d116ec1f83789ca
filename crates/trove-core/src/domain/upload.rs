//! Upload candidates scraped from a download or store page.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Platforms an upload is offered for.
    ///
    /// Scraped from the platform icons next to a download button; an upload
    /// with no recognized icon carries the empty set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Platforms: u32 {
        const ANDROID = 1;
        const WINDOWS = 1 << 1;
        const MAC = 1 << 2;
        const LINUX = 1 << 3;
    }
}

impl Platforms {
    /// Whether `self` offers every platform that `other` does.
    ///
    /// Used by the suggestion pre-pass: a candidate is only a plausible
    /// replacement for an installed upload if its platform set is a
    /// superset of the installed one.
    #[must_use]
    pub const fn is_superset_of(&self, other: Self) -> bool {
        self.contains(other)
    }
}

/// Locale an upload's row was rendered in.
///
/// Store pages are served localized; the scraped name/timestamp strings are
/// only comparable between two records rendered in the same locale. The
/// `Unknown` sentinel marks records scraped before locale tracking existed,
/// and is excluded from every locale-based tie-break.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    /// Locale was not recorded.
    #[default]
    Unknown,
    /// A concrete language tag (e.g. "en").
    Tag(String),
}

impl Locale {
    /// Build a locale from an optional stored tag.
    #[must_use]
    pub fn from_tag(tag: Option<String>) -> Self {
        match tag {
            Some(t) if !t.is_empty() => Self::Tag(t),
            _ => Self::Unknown,
        }
    }

    /// The stored tag, if known.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Tag(t) => Some(t),
        }
    }

    /// Whether two locales are meaningfully equal.
    ///
    /// Only true when BOTH sides are known and carry the same tag. An
    /// `Unknown` on either side never matches, not even another `Unknown`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Tag(a), Self::Tag(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Tag(t) => write!(f, "{t}"),
        }
    }
}

/// One selectable build offered by a store's download page.
///
/// Scraped fresh on every check and never persisted standalone; it exists
/// as the comparison operand handed to the update decision engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCandidate {
    /// Stable numeric key of the game this upload belongs to.
    pub game_id: i64,
    /// Upload ID, if the page exposes one. Some uploads have no stable ID.
    pub upload_id: Option<i64>,
    /// Display name of the upload (usually the file name).
    pub name: String,
    /// Free-text version tag. Present only for butler-pushed builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Build date string exactly as rendered on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_timestamp: Option<String>,
    /// File size exactly as rendered (e.g. "14 MB"). Never normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    /// Platforms this upload is offered for.
    pub platforms: Platforms,
    /// Locale the page was rendered in when this row was scraped.
    pub locale: Locale,
}

impl UploadCandidate {
    /// Create a candidate with the required fields.
    pub fn new(game_id: i64, name: impl Into<String>) -> Self {
        Self {
            game_id,
            upload_id: None,
            name: name.into(),
            version: None,
            upload_timestamp: None,
            file_size: None,
            platforms: Platforms::empty(),
            locale: Locale::Unknown,
        }
    }

    /// Set the upload ID.
    #[must_use]
    pub const fn with_upload_id(mut self, upload_id: i64) -> Self {
        self.upload_id = Some(upload_id);
        self
    }

    /// Set the version tag.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the build date string.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.upload_timestamp = Some(timestamp.into());
        self
    }

    /// Set the rendered file size.
    #[must_use]
    pub fn with_file_size(mut self, file_size: impl Into<String>) -> Self {
        self.file_size = Some(file_size.into());
        self
    }

    /// Set the platform set.
    #[must_use]
    pub const fn with_platforms(mut self, platforms: Platforms) -> Self {
        self.platforms = platforms;
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
    fn platforms_superset() {
        let android = Platforms::ANDROID;
        let desktop = Platforms::WINDOWS | Platforms::LINUX;
        let all = Platforms::ANDROID | Platforms::WINDOWS | Platforms::LINUX;

        assert!(all.is_superset_of(android));
        assert!(all.is_superset_of(desktop));
        assert!(!desktop.is_superset_of(android));
        // The empty set is a subset of everything
        assert!(android.is_superset_of(Platforms::empty()));
    }

    #[test]
    fn locale_matching_requires_both_known() {
        let en = Locale::Tag("en".to_string());
        let de = Locale::Tag("de".to_string());

        assert!(en.matches(&en.clone()));
        assert!(!en.matches(&de));
        assert!(!en.matches(&Locale::Unknown));
        // Two unknowns are NOT a match
        assert!(!Locale::Unknown.matches(&Locale::Unknown));
    }

    #[test]
    fn locale_from_tag_treats_empty_as_unknown() {
        assert_eq!(Locale::from_tag(None), Locale::Unknown);
        assert_eq!(Locale::from_tag(Some(String::new())), Locale::Unknown);
        assert_eq!(
            Locale::from_tag(Some("en".to_string())),
            Locale::Tag("en".to_string())
        );
    }

    #[test]
    fn candidate_builder() {
        let candidate = UploadCandidate::new(42, "game-1.2.apk")
            .with_upload_id(7)
            .with_version("1.2")
            .with_platforms(Platforms::ANDROID)
            .with_locale("en");

        assert_eq!(candidate.game_id, 42);
        assert_eq!(candidate.upload_id, Some(7));
        assert_eq!(candidate.version.as_deref(), Some("1.2"));
        assert_eq!(candidate.locale.tag(), Some("en"));
    }
}

//! Free-text version tag comparison.
//!
//! Butler version tags are arbitrary prose ("Version v2.0.1", "1.4",
//! "release 7") rather than semver. The comparator extracts the first
//! dotted numeric run from the tag and orders segment-wise; everything
//! else in the tag is ignored. An unparseable tag orders as not-newer,
//! so a prose-only tag never produces a spurious self-update prompt.

use std::cmp::Ordering;

/// Decides whether a candidate's version tag denotes a build newer than
/// the running one.
///
/// This is the strategy hook for the self-update branch of the decision
/// cascade: the app's own update channel compares version tags against
/// the running build instead of walking the generic heuristics.
pub trait SelfUpdateStrategy: Send + Sync {
    /// Whether `candidate_tag` is newer than the running build.
    fn is_newer(&self, candidate_tag: &str) -> bool;
}

/// Default [`SelfUpdateStrategy`]: dotted-numeric extraction and
/// segment-wise comparison.
#[derive(Clone, Debug)]
pub struct TagVersionComparator {
    current: Vec<u64>,
}

impl TagVersionComparator {
    /// Create a comparator for the running build's version string.
    ///
    /// An unparseable current version yields an empty segment list, which
    /// orders below any parseable tag; a broken build string therefore
    /// errs toward offering the update.
    #[must_use]
    pub fn new(current_version: &str) -> Self {
        Self {
            current: extract_segments(current_version).unwrap_or_default(),
        }
    }
}

impl SelfUpdateStrategy for TagVersionComparator {
    fn is_newer(&self, candidate_tag: &str) -> bool {
        extract_segments(candidate_tag)
            .is_some_and(|segments| compare_segments(&segments, &self.current) == Ordering::Greater)
    }
}

/// Extract the first dotted numeric run from a free-text tag.
///
/// Scans for the first digit, then consumes digits and dots until the run
/// ends. A `v`/`V` directly before the run is tolerated ("v2.0.1"), as is
/// any amount of leading prose ("Version v2.0.1"). Returns `None` when
/// the tag contains no digits at all.
#[must_use]
pub fn extract_segments(tag: &str) -> Option<Vec<u64>> {
    let start = tag.find(|c: char| c.is_ascii_digit())?;
    let run: String = tag[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let segments: Vec<u64> = run
        .split('.')
        .filter(|s| !s.is_empty())
        .map_while(|s| s.parse().ok())
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Segment-wise numeric comparison with missing segments as zero,
/// so "2.0" == "2.0.0" and "2.0.1" > "2.0".
fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_versions() {
        assert_eq!(extract_segments("1.0"), Some(vec![1, 0]));
        assert_eq!(extract_segments("2.0.1"), Some(vec![2, 0, 1]));
        assert_eq!(extract_segments("7"), Some(vec![7]));
    }

    #[test]
    fn extracts_prefixed_versions() {
        // The literal historical shapes
        assert_eq!(extract_segments("Version v2.0.1"), Some(vec![2, 0, 1]));
        assert_eq!(extract_segments("v1.4"), Some(vec![1, 4]));
        assert_eq!(extract_segments("release 7"), Some(vec![7]));
    }

    #[test]
    fn suffixes_are_ignored() {
        assert_eq!(extract_segments("1.2.3-beta2"), Some(vec![1, 2, 3]));
        assert_eq!(extract_segments("2.0 (hotfix)"), Some(vec![2, 0]));
        // A trailing dot does not create an empty segment
        assert_eq!(extract_segments("1.2."), Some(vec![1, 2]));
    }

    #[test]
    fn prose_without_digits_is_unparseable() {
        assert_eq!(extract_segments("latest build"), None);
        assert_eq!(extract_segments(""), None);
    }

    #[test]
    fn newer_detection() {
        let current = TagVersionComparator::new("2.0.1");

        assert!(current.is_newer("Version v2.1"));
        assert!(current.is_newer("2.0.2"));
        assert!(current.is_newer("v3"));
        assert!(!current.is_newer("2.0.1"));
        assert!(!current.is_newer("Version v2.0.1"));
        assert!(!current.is_newer("1.9.9"));
    }

    #[test]
    fn missing_segments_compare_as_zero() {
        let current = TagVersionComparator::new("2.0");
        assert!(!current.is_newer("2.0.0"));
        assert!(current.is_newer("2.0.1"));
    }

    #[test]
    fn unparseable_tag_is_never_newer() {
        let current = TagVersionComparator::new("1.0");
        assert!(!current.is_newer("latest build"));
        assert!(!current.is_newer(""));
    }

    #[test]
    fn broken_current_version_errs_toward_updating() {
        let current = TagVersionComparator::new("not a version");
        assert!(current.is_newer("0.1"));
        assert!(!current.is_newer("no digits here"));
    }
}

//! The heuristic comparison cascade.
//!
//! One ordered cascade, consolidated from the generations of checkers
//! that preceded it. Each step is a tie-break escalation used only when
//! the prior step could not reach a confident verdict:
//!
//! 1. a suggestion pre-pass over all candidates (exact name match wins
//!    unconditionally, then platform-superset uniqueness),
//! 2. reconciliation against the candidate sharing the installed upload
//!    ID (version tags, locale-gated timestamp fallback, self-update),
//! 3. the all-IDs-different fallback,
//! 4. best-effort fallback when the installed record has no upload ID.
//!
//! The site offers no versioned API; everything below is heuristic over
//! scraped strings, and every string comparison is exact. A formatting
//! change alone registers as "changed", which is the intended bias: a
//! false "update available" costs one wasted page visit, a false
//! "up to date" silently strands the user on an old build.

use tracing::debug;

use super::version::SelfUpdateStrategy;
use crate::domain::{Installation, UpdateCheckResult, UploadCandidate};

/// Compare an installed upload against the candidates scraped from one
/// fetch of the game's authoritative download (or store) page.
///
/// `self_update` is supplied only when `installed` is the app's own
/// update channel; that branch compares version tags against the running
/// build and never falls through to the later heuristics.
///
/// Pure and synchronous: no I/O, no clock reads beyond the result's
/// bookkeeping timestamp.
#[must_use]
pub fn compare_uploads(
    installed: &Installation,
    candidates: &[UploadCandidate],
    self_update: Option<&dyn SelfUpdateStrategy>,
) -> UpdateCheckResult {
    // An empty page is a meaningful outcome, not an error: the game may
    // have withdrawn its downloads entirely.
    if candidates.is_empty() {
        return UpdateCheckResult::empty(installed.internal_id);
    }

    let suggestion = suggest_candidate(installed, candidates);

    let matched = installed
        .upload_id
        .and_then(|id| candidates.iter().find(|c| c.upload_id == Some(id)));

    if let Some(candidate) = matched {
        // Self-update channel: version tags against the running build,
        // nothing else. This branch never falls through.
        if let Some(strategy) = self_update {
            let newer = candidate
                .version
                .as_deref()
                .is_some_and(|tag| strategy.is_newer(tag));
            return if newer {
                UpdateCheckResult::update_available(installed.internal_id, Some(candidate))
            } else {
                UpdateCheckResult::up_to_date(installed.internal_id)
            };
        }

        return reconcile_same_upload(installed, candidate);
    }

    if installed.upload_id.is_some() {
        // Step 3: the installed upload ID vanished from the page. The
        // build was superseded; suggest what the pre-pass found, or
        // nothing if it was ambiguous.
        debug!(
            installation = installed.internal_id,
            upload = ?installed.upload_id,
            suggested = ?suggestion.and_then(|c| c.upload_id),
            "installed upload id no longer offered"
        );
        return UpdateCheckResult::update_available(installed.internal_id, suggestion);
    }

    // Step 4: no stable ID on record at all; best effort.
    UpdateCheckResult::update_available(installed.internal_id, suggestion)
}

/// Suggestion pre-pass over all candidates.
///
/// A candidate whose name exactly equals the installed upload's name is
/// the unconditional suggestion. Failing that, a candidate is plausible
/// if its platform set is a superset of the installed one; a unique
/// plausible candidate becomes the suggestion, while two or more
/// suppress it entirely. Guessing between siblings (an arm64 and an x86
/// build, say) would risk downloading the wrong artifact.
fn suggest_candidate<'a>(
    installed: &Installation,
    candidates: &'a [UploadCandidate],
) -> Option<&'a UploadCandidate> {
    let mut supersets: Vec<&UploadCandidate> = Vec::new();

    for candidate in candidates {
        if candidate.name == installed.upload_name {
            return Some(candidate);
        }
        if candidate.platforms.is_superset_of(installed.platforms) {
            supersets.push(candidate);
        }
    }

    match supersets.as_slice() {
        [only] => Some(*only),
        [] => None,
        many => {
            debug!(
                installation = installed.internal_id,
                count = many.len(),
                "suggestion suppressed: multiple platform-compatible candidates"
            );
            None
        }
    }
}

/// Reconcile against the candidate that shares the installed upload ID.
fn reconcile_same_upload(
    installed: &Installation,
    candidate: &UploadCandidate,
) -> UpdateCheckResult {
    match (installed.version.as_deref(), candidate.version.as_deref()) {
        (Some(installed_tag), Some(candidate_tag)) => {
            let locales_match = installed.locale.matches(&candidate.locale);
            if installed_tag == candidate_tag {
                if locales_match {
                    UpdateCheckResult::up_to_date(installed.internal_id)
                } else {
                    timestamp_fallback(installed, candidate)
                }
            } else if locales_match {
                UpdateCheckResult::update_available(installed.internal_id, Some(candidate))
            } else {
                // A differing tag across locales is a probable false
                // positive (the page may localize tag text); let the
                // build date decide instead.
                timestamp_fallback(installed, candidate)
            }
        }
        // The upload grew a version tag it didn't have at install time:
        // it was re-pushed through butler, which implies a new build.
        (None, Some(_)) => {
            UpdateCheckResult::update_available(installed.internal_id, Some(candidate))
        }
        // No usable tags on one or both sides: exact string comparison
        // of build date and rendered size.
        _ => {
            let changed = installed.upload_timestamp != candidate.upload_timestamp
                || installed.file_size != candidate.file_size;
            if changed {
                UpdateCheckResult::update_available(installed.internal_id, Some(candidate))
            } else {
                UpdateCheckResult::up_to_date(installed.internal_id)
            }
        }
    }
}

/// Timestamp divergence outweighs locale mismatch: matching build dates
/// mean the same build, differing ones a new build.
fn timestamp_fallback(installed: &Installation, candidate: &UploadCandidate) -> UpdateCheckResult {
    if installed.upload_timestamp == candidate.upload_timestamp {
        UpdateCheckResult::up_to_date(installed.internal_id)
    } else {
        UpdateCheckResult::update_available(installed.internal_id, Some(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::version::TagVersionComparator;
    use crate::domain::{InstallStatus, Platforms, UpdateCheckCode};

    fn installed(upload_id: Option<i64>) -> Installation {
        let mut candidate = UploadCandidate::new(1, "game.apk")
            .with_version("1.0")
            .with_locale("en")
            .with_timestamp("01 January 2021")
            .with_platforms(Platforms::ANDROID);
        candidate.upload_id = upload_id;
        let mut install = Installation::from_candidate(&candidate, InstallStatus::Installed);
        install.internal_id = 9;
        install
    }

    #[test]
    fn empty_candidates_yield_empty() {
        let result = compare_uploads(&installed(Some(5)), &[], None);
        assert_eq!(result.code, UpdateCheckCode::Empty);
    }

    #[test]
    fn same_id_same_version_same_locale_is_up_to_date() {
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_version("1.0")
                .with_locale("en"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpToDate);
    }

    #[test]
    fn same_id_new_version_is_update() {
        let candidates = vec![
            UploadCandidate::new(1, "game-1.1.apk")
                .with_upload_id(5)
                .with_version("1.1")
                .with_locale("en")
                .with_timestamp("01 June 2021"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, Some(5));
        assert_eq!(result.new_version.as_deref(), Some("1.1"));
    }

    #[test]
    fn locale_mismatch_falls_back_to_matching_timestamp() {
        // Differing version strings, mismatched locales, identical
        // timestamps: probable rendering artifact, not a new build.
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_version("Version 1.0")
                .with_locale("de")
                .with_timestamp("01 January 2021"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpToDate);
    }

    #[test]
    fn locale_mismatch_with_diverged_timestamp_is_update() {
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_version("Version 1.1")
                .with_locale("de")
                .with_timestamp("01 June 2021"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
    }

    #[test]
    fn grown_version_tag_is_update() {
        let mut record = installed(Some(5));
        record.version = None;
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_version("1.0")
                .with_locale("en"),
        ];
        let result = compare_uploads(&record, &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
    }

    #[test]
    fn no_tags_compare_timestamp_and_size_strings() {
        let mut record = installed(Some(5));
        record.version = None;
        record.file_size = Some("14 MB".to_string());

        let unchanged = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_timestamp("01 January 2021")
                .with_file_size("14 MB"),
        ];
        let result = compare_uploads(&record, &unchanged, None);
        assert_eq!(result.code, UpdateCheckCode::UpToDate);

        // A formatting change alone registers as changed
        let reformatted = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_timestamp("01 January 2021")
                .with_file_size("14.0 MB"),
        ];
        let result = compare_uploads(&record, &reformatted, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
    }

    #[test]
    fn vanished_upload_id_suggests_name_match() {
        let candidates = vec![
            UploadCandidate::new(1, "other.apk").with_upload_id(6),
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(7)
                .with_version("2.0"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        // "game.apk" matches the installed name exactly
        assert_eq!(result.upload_id, Some(7));
        assert_eq!(result.new_version.as_deref(), Some("2.0"));
    }

    #[test]
    fn vanished_upload_id_with_unique_superset_suggests_it() {
        let candidates = vec![
            UploadCandidate::new(1, "desktop.zip")
                .with_upload_id(6)
                .with_platforms(Platforms::WINDOWS),
            UploadCandidate::new(1, "mobile.apk")
                .with_upload_id(7)
                .with_platforms(Platforms::ANDROID),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, Some(7));
    }

    #[test]
    fn ambiguous_suggestion_is_null_not_a_guess() {
        // Two android-compatible candidates, neither matching by name:
        // the suggestion must be suppressed.
        let candidates = vec![
            UploadCandidate::new(1, "arm64.apk")
                .with_upload_id(6)
                .with_platforms(Platforms::ANDROID),
            UploadCandidate::new(1, "x86.apk")
                .with_upload_id(7)
                .with_platforms(Platforms::ANDROID | Platforms::WINDOWS),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, None);
    }

    #[test]
    fn disjoint_platforms_suggest_nothing() {
        let candidates = vec![
            UploadCandidate::new(1, "win.zip")
                .with_upload_id(6)
                .with_platforms(Platforms::WINDOWS),
            UploadCandidate::new(1, "mac.dmg")
                .with_upload_id(7)
                .with_platforms(Platforms::MAC),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, None);
    }

    #[test]
    fn no_upload_id_on_record_is_best_effort() {
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(6)
                .with_version("1.5"),
        ];
        let result = compare_uploads(&installed(None), &candidates, None);
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, Some(6));
    }

    #[test]
    fn idempotent_up_to_date() {
        let record = installed(Some(5));
        let candidates = vec![
            UploadCandidate::new(1, "game.apk")
                .with_upload_id(5)
                .with_version("1.0")
                .with_locale("en"),
        ];
        let first = compare_uploads(&record, &candidates, None);
        let second = compare_uploads(&record, &candidates, None);
        assert_eq!(first.code, UpdateCheckCode::UpToDate);
        assert_eq!(second.code, UpdateCheckCode::UpToDate);
        // The inputs were not mutated
        assert_eq!(record.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn self_update_newer_tag_is_update() {
        let strategy = TagVersionComparator::new("2.0.1");
        let candidates = vec![
            UploadCandidate::new(1, "app.apk")
                .with_upload_id(5)
                .with_version("Version v2.1"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, Some(&strategy));
        assert_eq!(result.code, UpdateCheckCode::UpdateAvailable);
        assert_eq!(result.upload_id, Some(5));
    }

    #[test]
    fn self_update_same_tag_is_up_to_date() {
        let strategy = TagVersionComparator::new("2.0.1");
        // Locale mismatch and timestamp divergence would normally force an
        // update verdict; the self-update branch must not fall through.
        let candidates = vec![
            UploadCandidate::new(1, "app.apk")
                .with_upload_id(5)
                .with_version("Version v2.0.1")
                .with_locale("de")
                .with_timestamp("01 June 2021"),
        ];
        let result = compare_uploads(&installed(Some(5)), &candidates, Some(&strategy));
        assert_eq!(result.code, UpdateCheckCode::UpToDate);
    }

    #[test]
    fn self_update_untagged_candidate_is_up_to_date() {
        let strategy = TagVersionComparator::new("2.0.1");
        let candidates = vec![UploadCandidate::new(1, "app.apk").with_upload_id(5)];
        let result = compare_uploads(&installed(Some(5)), &candidates, Some(&strategy));
        assert_eq!(result.code, UpdateCheckCode::UpToDate);
    }
}

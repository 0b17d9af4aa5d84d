mod support;

use pretty_assertions::assert_eq;
use s3fs_sync::policy::{DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, RuleList, RuleListKind};
use s3fs_sync::{PathPolicyMatcher, Policy, S3fsError, S3fsSettings};

// ── Parsing ─────────────────────────────────────────────────────

#[test]
fn timeout_prefix_is_parsed() {
    let list = RuleList::parse(RuleListKind::PresignedUrls, "120|private_files/.*");
    assert_eq!(list.rules().len(), 1);
    assert_eq!(list.rules()[0].timeout_seconds, 120);
    assert_eq!(list.rules()[0].pattern, "private_files/.*");
}

#[test]
fn bare_pattern_gets_default_timeout() {
    let list = RuleList::parse(RuleListKind::PresignedUrls, "video/.*");
    assert_eq!(list.rules()[0].timeout_seconds, DEFAULT_TIMEOUT_SECS);
    assert_eq!(list.rules()[0].timeout_seconds, 60);
    assert_eq!(list.rules()[0].pattern, "video/.*");
}

#[test]
fn line_order_is_preserved_and_blank_lines_ignored() {
    let text = "30|first/.*\r\n\n   \nsecond/.*\n90|third/.*\n";
    let list = RuleList::parse(RuleListKind::PresignedUrls, text);
    let patterns: Vec<_> = list.rules().iter().map(|r| r.pattern.as_str()).collect();
    assert_eq!(patterns, vec!["first/.*", "second/.*", "third/.*"]);
    assert!(list.diagnostics().is_empty());
}

#[test]
fn malformed_line_is_skipped_and_reported() {
    let text = "ok/.*\nbroken/(\n0|zero/.*\nalso-ok/.*";
    let list = RuleList::parse(RuleListKind::Torrents, text);

    let patterns: Vec<_> = list.rules().iter().map(|r| r.pattern.as_str()).collect();
    assert_eq!(patterns, vec!["ok/.*", "also-ok/.*"]);

    let diagnostics = list.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    match &diagnostics[0] {
        S3fsError::PolicyEvaluation {
            list, line, pattern, ..
        } => {
            assert_eq!(list, "torrents");
            assert_eq!(*line, 2);
            assert_eq!(pattern, "broken/(");
        }
        other => panic!("expected PolicyEvaluation, got {other:?}"),
    }
    assert!(matches!(diagnostics[1], S3fsError::PolicyEvaluation { line: 3, .. }));
}

#[test]
fn timeout_beyond_one_week_is_skipped() {
    let list = RuleList::parse(RuleListKind::PresignedUrls, "700000|video/.*\n604800|docs/.*");

    assert_eq!(list.rules().len(), 1);
    assert_eq!(list.rules()[0].timeout_seconds, MAX_TIMEOUT_SECS);
    assert_eq!(list.rules()[0].pattern, "docs/.*");

    let diagnostics = list.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        &diagnostics[0],
        S3fsError::PolicyEvaluation { line: 1, pattern, .. } if pattern == "700000|video/.*"
    ));
}

// ── Evaluation ──────────────────────────────────────────────────

#[test]
fn presigned_wins_over_torrent() {
    let matcher = PathPolicyMatcher::new("45|media/.*", "", "media/.*");
    assert_eq!(
        matcher.evaluate("media/movie.mkv"),
        Policy::PresignedUrl { timeout_seconds: 45 }
    );
}

#[test]
fn saveas_wins_over_torrent() {
    let matcher = PathPolicyMatcher::new("", "downloads/.*", "downloads/.*");
    assert_eq!(matcher.evaluate("downloads/setup.exe"), Policy::SaveAs);
}

#[test]
fn torrent_applies_when_nothing_else_matches() {
    let matcher = PathPolicyMatcher::new("private_files/.*", "video/.*", "big_files/.*");
    assert_eq!(matcher.evaluate("big_files/dump.iso"), Policy::Torrent);
}

#[test]
fn no_match_serves_normally() {
    let matcher = PathPolicyMatcher::new("private_files/.*", "video/.*", "big_files/.*");
    assert_eq!(matcher.evaluate("images/logo.png"), Policy::NoPolicy);
}

#[test]
fn first_matching_rule_in_list_decides_timeout() {
    let matcher = PathPolicyMatcher::new("10|reports/.*\n300|reports/annual/.*", "", "");
    assert_eq!(
        matcher.evaluate("reports/annual/2024.pdf"),
        Policy::PresignedUrl { timeout_seconds: 10 }
    );
}

#[test]
fn patterns_are_unanchored_over_the_full_path() {
    let matcher = PathPolicyMatcher::new("", r"\.mp4$", "");
    assert_eq!(matcher.evaluate("styles/video/intro.mp4"), Policy::SaveAs);
    assert_eq!(matcher.evaluate("intro.mp4.txt"), Policy::NoPolicy);

    let matcher = PathPolicyMatcher::new("private", "", "");
    assert_eq!(
        matcher.evaluate("a/b/private_files/c.txt"),
        Policy::PresignedUrl { timeout_seconds: 60 }
    );
}

#[test]
fn broken_rule_does_not_disable_its_list() {
    let matcher = PathPolicyMatcher::new("[unclosed\n20|secure/.*", "", "");
    assert_eq!(
        matcher.evaluate("secure/key.pem"),
        Policy::PresignedUrl { timeout_seconds: 20 }
    );
    assert_eq!(matcher.diagnostics().len(), 1);
}

#[test]
fn private_paths_never_get_torrents() {
    let matcher = PathPolicyMatcher::new("", "", "big_files/.*");
    assert_eq!(
        matcher.evaluate_with_privacy("big_files/a.iso", |_| true),
        Policy::NoPolicy
    );
    assert_eq!(
        matcher.evaluate_with_privacy("big_files/a.iso", |_| false),
        Policy::Torrent
    );
}

#[test]
fn privacy_predicate_leaves_other_policies_alone() {
    let matcher = PathPolicyMatcher::new("secure/.*", "", "secure/.*");
    assert_eq!(
        matcher.evaluate_with_privacy("secure/a", |_| true),
        Policy::PresignedUrl { timeout_seconds: 60 }
    );
}

#[test]
fn matcher_from_resolved_config() {
    let config = support::resolve(S3fsSettings {
        presigned_urls: "120|private_files/.*".into(),
        saveas: "video/.*".into(),
        torrents: "big_files/.*".into(),
        ..support::base_settings()
    });
    let matcher = PathPolicyMatcher::from_config(&config);

    assert_eq!(
        matcher.evaluate("private_files/report.pdf"),
        Policy::PresignedUrl { timeout_seconds: 120 }
    );
    assert_eq!(matcher.evaluate("video/clip.mp4"), Policy::SaveAs);
    assert_eq!(matcher.evaluate("big_files/dump.iso"), Policy::Torrent);
    assert_eq!(matcher.list(RuleListKind::SaveAs).rules().len(), 1);
}

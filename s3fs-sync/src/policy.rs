//! Delivery policy rules: presigned URLs, forced save-as and torrents.
//!
//! Each rule list is operator-supplied text with one rule per line, either
//! `timeout|pattern` or a bare `pattern` (timeout defaults to 60 seconds).
//! Patterns are unanchored regular expressions matched against the whole
//! requested path. Lists are consulted in fixed order (presigned URLs, then
//! save-as, then torrents) and the first matching rule of the first matching
//! list decides the policy.
//!
//! A line that cannot be turned into a rule is skipped and kept as a
//! diagnostic: zero timeout, timeout above one week, empty pattern, or a
//! pattern that does not compile. The remaining rules stay active.

use crate::config::ResolvedConfig;
use crate::error::S3fsError;
use regex_lite::Regex;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Timeout applied when a rule line has no `timeout|` prefix.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest expiry S3 accepts for a presigned URL (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// The three rule lists, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleListKind {
    PresignedUrls,
    SaveAs,
    Torrents,
}

impl RuleListKind {
    /// Settings key the list is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleListKind::PresignedUrls => "presigned_urls",
            RuleListKind::SaveAs => "saveas",
            RuleListKind::Torrents => "torrents",
        }
    }
}

impl fmt::Display for RuleListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled rule.
#[derive(Clone, Debug)]
pub struct PathRule {
    pub timeout_seconds: u64,
    pub pattern: String,
    regex: Regex,
}

impl PathRule {
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Outcome of evaluating a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Policy {
    PresignedUrl { timeout_seconds: u64 },
    SaveAs,
    Torrent,
    /// Serve normally.
    NoPolicy,
}

/// Splits a rule line into its timeout and pattern text.
///
/// Returns `Ok(None)` for blank lines. A prefix before the first `|` only
/// counts as a timeout when it is all ASCII digits, so `jpg|png` stays a
/// single alternation pattern.
pub fn split_rule_line(line: &str) -> Result<Option<(u64, &str)>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (timeout, pattern) = match line.split_once('|') {
        Some((prefix, rest))
            if !prefix.trim().is_empty() && prefix.trim().bytes().all(|b| b.is_ascii_digit()) =>
        {
            let timeout = prefix
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| format!("timeout {:?} is not a positive integer", prefix.trim()))?;
            if timeout > MAX_TIMEOUT_SECS {
                return Err(format!(
                    "timeout {timeout} exceeds the presigned URL limit of {MAX_TIMEOUT_SECS} seconds"
                ));
            }
            (timeout, rest.trim())
        }
        _ => (DEFAULT_TIMEOUT_SECS, line),
    };

    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }
    Ok(Some((timeout, pattern)))
}

/// A parsed rule list plus the lines that were skipped.
#[derive(Clone, Debug)]
pub struct RuleList {
    kind: RuleListKind,
    rules: Vec<PathRule>,
    diagnostics: Vec<(usize, String, String)>,
}

impl RuleList {
    /// Parses `text`, preserving line order.
    pub fn parse(kind: RuleListKind, text: &str) -> Self {
        let mut rules = Vec::new();
        let mut diagnostics = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let compiled = split_rule_line(line).and_then(|parsed| {
                parsed
                    .map(|(timeout_seconds, pattern)| {
                        Regex::new(pattern)
                            .map(|regex| PathRule {
                                timeout_seconds,
                                pattern: pattern.to_string(),
                                regex,
                            })
                            .map_err(|e| e.to_string())
                    })
                    .transpose()
            });

            match compiled {
                Ok(Some(rule)) => rules.push(rule),
                Ok(None) => {}
                Err(reason) => {
                    warn!("skipping {kind} rule on line {line_no} ({:?}): {reason}", line.trim());
                    diagnostics.push((line_no, line.trim().to_string(), reason));
                }
            }
        }

        Self {
            kind,
            rules,
            diagnostics,
        }
    }

    pub fn kind(&self) -> RuleListKind {
        self.kind
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// First rule, in line order, whose pattern matches `path`.
    pub fn first_match(&self, path: &str) -> Option<&PathRule> {
        self.rules.iter().find(|rule| rule.is_match(path))
    }

    /// Skipped lines as [`S3fsError::PolicyEvaluation`] values.
    pub fn diagnostics(&self) -> Vec<S3fsError> {
        self.diagnostics
            .iter()
            .map(|(line, pattern, reason)| S3fsError::PolicyEvaluation {
                list: self.kind.as_str().to_string(),
                line: *line,
                pattern: pattern.clone(),
                reason: reason.clone(),
            })
            .collect()
    }
}

/// Chooses the delivery policy for requested paths.
#[derive(Clone, Debug)]
pub struct PathPolicyMatcher {
    presigned_urls: RuleList,
    saveas: RuleList,
    torrents: RuleList,
}

impl PathPolicyMatcher {
    pub fn new(presigned_urls: &str, saveas: &str, torrents: &str) -> Self {
        Self {
            presigned_urls: RuleList::parse(RuleListKind::PresignedUrls, presigned_urls),
            saveas: RuleList::parse(RuleListKind::SaveAs, saveas),
            torrents: RuleList::parse(RuleListKind::Torrents, torrents),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(&config.presigned_urls, &config.saveas, &config.torrents)
    }

    pub fn list(&self, kind: RuleListKind) -> &RuleList {
        match kind {
            RuleListKind::PresignedUrls => &self.presigned_urls,
            RuleListKind::SaveAs => &self.saveas,
            RuleListKind::Torrents => &self.torrents,
        }
    }

    /// Evaluates `path` against the lists in precedence order.
    pub fn evaluate(&self, path: &str) -> Policy {
        if let Some(rule) = self.presigned_urls.first_match(path) {
            return Policy::PresignedUrl {
                timeout_seconds: rule.timeout_seconds,
            };
        }
        if self.saveas.first_match(path).is_some() {
            return Policy::SaveAs;
        }
        if self.torrents.first_match(path).is_some() {
            return Policy::Torrent;
        }
        Policy::NoPolicy
    }

    /// Like [`evaluate`](Self::evaluate), but private files are never
    /// delivered as torrents. `is_private` is only consulted on a torrent match.
    pub fn evaluate_with_privacy<F>(&self, path: &str, is_private: F) -> Policy
    where
        F: FnOnce(&str) -> bool,
    {
        match self.evaluate(path) {
            Policy::Torrent if is_private(path) => Policy::NoPolicy,
            policy => policy,
        }
    }

    /// Every skipped line across the three lists.
    pub fn diagnostics(&self) -> Vec<S3fsError> {
        [&self.presigned_urls, &self.saveas, &self.torrents]
            .into_iter()
            .flat_map(RuleList::diagnostics)
            .collect()
    }
}

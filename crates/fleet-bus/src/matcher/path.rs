//! # Path Matching
//!
//! Hierarchical glob matching over `:`-separated addresses.
//!
//! ## Pattern Grammar
//!
//! | Token | Matches |
//! |-------|---------|
//! | `**`  | zero or more whole segments |
//! | `*`   | any run of characters within one segment |
//! | `?`   | exactly one character within one segment |
//!
//! [`PathMatcher`] implements the plain grammar. [`ProfileAwareMatcher`]
//! wraps it so that an identity running several profiles at once
//! (`app:dev,cloud:8080`) matches a pattern naming any one of them.

use fleet_types::address::PROFILE_SEPARATOR;
use fleet_types::{MATCH_ALL, SEGMENT_SEPARATOR};

/// Matches a concrete candidate against a pattern.
pub trait PatternMatcher: Send + Sync {
    /// Returns true if `candidate` is addressed by `pattern`.
    fn matches(&self, pattern: &str, candidate: &str) -> bool;
}

/// Segment glob matcher with a configurable separator.
#[derive(Debug, Clone, Copy)]
pub struct PathMatcher {
    separator: char,
}

impl PathMatcher {
    #[must_use]
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// True if the text contains any wildcard.
    #[must_use]
    pub fn is_pattern(text: &str) -> bool {
        text.contains('*') || text.contains('?')
    }

    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split(self.separator)
            .filter(|token| !token.is_empty())
            .collect()
    }
}

impl Default for PathMatcher {
    fn default() -> Self {
        Self::new(SEGMENT_SEPARATOR)
    }
}

impl PatternMatcher for PathMatcher {
    fn matches(&self, pattern: &str, candidate: &str) -> bool {
        if pattern.starts_with(self.separator) != candidate.starts_with(self.separator) {
            return false;
        }
        let pattern_segments = self.tokenize(pattern);
        let candidate_segments = self.tokenize(candidate);
        match_segments(&pattern_segments, &candidate_segments)
    }
}

fn match_segments(pattern: &[&str], candidate: &[&str]) -> bool {
    match pattern.split_first() {
        None => candidate.is_empty(),
        Some((&head, rest)) if head == MATCH_ALL => {
            (0..=candidate.len()).any(|skip| match_segments(rest, &candidate[skip..]))
        }
        Some((head, rest)) => match candidate.split_first() {
            Some((segment, tail)) => match_segment(head, segment) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Glob match of a single segment (`*` and `?`).
fn match_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, mark)) = backtrack {
            // Let the last star swallow one more character.
            p = star + 1;
            t = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// [`PathMatcher`] plus multi-profile expansion of the candidate.
///
/// When the plain match fails and the candidate's second segment holds
/// several comma-separated profiles, each profile is substituted for the
/// whole segment in turn and the match retried. Only the candidate side is
/// expanded: a pattern never addresses several profiles at once.
#[derive(Debug, Clone, Default)]
pub struct ProfileAwareMatcher<M = PathMatcher> {
    delegate: M,
}

impl<M: PatternMatcher> ProfileAwareMatcher<M> {
    pub fn new(delegate: M) -> Self {
        Self { delegate }
    }
}

impl<M: PatternMatcher> PatternMatcher for ProfileAwareMatcher<M> {
    fn matches(&self, pattern: &str, candidate: &str) -> bool {
        if self.delegate.matches(pattern, candidate) {
            return true;
        }

        let segments: Vec<&str> = candidate.split(SEGMENT_SEPARATOR).collect();
        if segments.len() <= 1 || !segments[1].contains(PROFILE_SEPARATOR) {
            return false;
        }

        let separator = SEGMENT_SEPARATOR.to_string();
        segments[1]
            .split(PROFILE_SEPARATOR)
            .filter(|profile| !profile.is_empty())
            .any(|profile| {
                let mut expanded = segments.clone();
                expanded[1] = profile;
                let expanded = expanded.join(separator.as_str());
                self.delegate.matches(pattern, &expanded)
            })
    }
}

//! Transition Pattern Matching
//!
//! Glob-style matching of outcome labels against transition patterns:
//! - `*` matches any run of characters (including none)
//! - `?` matches exactly one character
//! - anything else matches itself
//!
//! When several patterns match a label the most specific one is chosen
//! (see [`select`]).

use log::debug;

use super::model::Transition;

/// The catch-all pattern.
pub const WILDCARD: &str = "*";

/// Checks if a pattern contains glob syntax.
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Tests whether `label` matches the glob `pattern`.
///
/// # Example
/// ```
/// use flowbatch::workflow::pattern::matches;
///
/// assert!(matches("*", "PRESENT"));
/// assert!(matches("NO_*", "NO_TRIM_REQUIRED"));
/// assert!(matches("C?T", "CAT"));
/// assert!(!matches("PRESENT", "NOT_PRESENT"));
/// ```
pub fn matches(pattern: &str, label: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let l: Vec<char> = label.chars().collect();

    let (mut pi, mut li) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while li < l.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            resume = li;
            pi += 1;
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == l[li]) {
            pi += 1;
            li += 1;
        } else if let Some(s) = star {
            // Let the last star swallow one more character and retry
            pi = s + 1;
            resume += 1;
            li = resume;
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Number of literal (non-glob) characters in a pattern.
///
/// Higher means more specific: `"NO_*"` outranks `"*"`.
pub fn specificity(pattern: &str) -> usize {
    pattern.chars().filter(|&c| c != '*' && c != '?').count()
}

/// Picks the transition that handles `label`.
///
/// 1. A transition whose pattern equals the label exactly.
/// 2. Otherwise the matching glob with the highest [`specificity`];
///    equal specificity keeps the earliest registered transition.
/// 3. Otherwise `None`.
pub fn select<'a, I>(candidates: I, label: &str) -> Option<&'a Transition>
where
    I: IntoIterator<Item = &'a Transition>,
{
    let mut best: Option<(&'a Transition, usize)> = None;

    for transition in candidates {
        if transition.pattern == label {
            debug!(
                "'{}' on '{}': exact match -> {}",
                transition.from, label, transition.target
            );
            return Some(transition);
        }

        if !has_wildcards(&transition.pattern) || !matches(&transition.pattern, label) {
            continue;
        }

        let rank = specificity(&transition.pattern);
        match best {
            Some((_, best_rank)) if best_rank >= rank => {}
            _ => best = Some((transition, rank)),
        }
    }

    if let Some((transition, _)) = best {
        debug!(
            "'{}' on '{}': pattern '{}' -> {}",
            transition.from, label, transition.pattern, transition.target
        );
    }

    best.map(|(transition, _)| transition)
}

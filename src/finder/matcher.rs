//! String matchers and range predicates
//!
//! Every matcher is one [`MatchMode`] applied to one or many patterns
//! ([`Arity`]). Case-insensitive matching folds the patterns once when the
//! matcher is built and folds the subject on each call; regular expressions
//! take the flag as a compile option instead.

use std::fmt;
use std::io;
use std::slice;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};

use crate::errors::{FindError, FindResult};

/// How a pattern is compared with a subject string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
    /// Shell-style `*`, `?` and `[...]` over the whole subject
    WildCard,
    /// Regular expression search anywhere in the subject
    RegExp,
}

impl MatchMode {
    pub const ALL: [MatchMode; 6] = [
        MatchMode::Exact,
        MatchMode::Contains,
        MatchMode::StartsWith,
        MatchMode::EndsWith,
        MatchMode::WildCard,
        MatchMode::RegExp,
    ];

    /// Whether the line-oriented content search supports this mode
    pub fn is_content_mode(self) -> bool {
        matches!(
            self,
            MatchMode::Contains | MatchMode::StartsWith | MatchMode::WildCard | MatchMode::RegExp
        )
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMode::Exact => "Exact",
            MatchMode::Contains => "Contains",
            MatchMode::StartsWith => "StartsWith",
            MatchMode::EndsWith => "EndsWith",
            MatchMode::WildCard => "WildCard",
            MatchMode::RegExp => "RegExp",
        };
        f.write_str(name)
    }
}

impl FromStr for MatchMode {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "contains" => Ok(MatchMode::Contains),
            "startswith" | "starts-with" | "prefix" => Ok(MatchMode::StartsWith),
            "endswith" | "ends-with" | "suffix" => Ok(MatchMode::EndsWith),
            "wildcard" | "glob" => Ok(MatchMode::WildCard),
            "regexp" | "regex" => Ok(MatchMode::RegExp),
            _ => Err(FindError::PatternError {
                message: format!("unknown match mode '{}'", s),
            }),
        }
    }
}

/// One pattern or a set of patterns combined with OR
#[derive(Debug, Clone)]
pub enum Arity<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Arity<T> {
    /// Builds a scalar for a single item and a set otherwise.
    ///
    /// Returns None when `items` is empty.
    pub fn from_vec(mut items: Vec<T>) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => items.pop().map(Arity::One),
            _ => Some(Arity::Many(items)),
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        match self {
            Arity::One(item) => slice::from_ref(item).iter(),
            Arity::Many(items) => items.iter(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Arity::One(_) => 1,
            Arity::Many(items) => items.len(),
        }
    }

    fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Arity<U>, E> {
        let mut f = f;
        Ok(match self {
            Arity::One(item) => Arity::One(f(item)?),
            Arity::Many(items) => {
                Arity::Many(items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?)
            }
        })
    }
}

#[derive(Debug, Clone)]
enum MatcherKind {
    Exact(Arity<String>),
    Contains(Arity<String>),
    StartsWith(Arity<String>),
    EndsWith(Arity<String>),
    WildCard(Arity<Pattern>),
    RegExp(Regex),
}

/// A ready-to-call string predicate for one (mode, arity, case) combination
#[derive(Debug, Clone)]
pub struct Matcher {
    kind: MatcherKind,
    fold_case: bool,
}

const WILDCARD_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Case folding applied to patterns and subjects in case-insensitive mode.
///
/// 在小写化之后再展开 Unicode 全量折叠中的多字符映射（如 ß -> ss），
/// 使 "Straße" 与 "STRASSE" 视为相同。
pub fn fold_case(s: &str) -> String {
    if s.is_ascii() {
        return s.to_ascii_lowercase();
    }

    let mut folded = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'ß' => folded.push_str("ss"),
            'ſ' => folded.push('s'),
            'ς' => folded.push('σ'),
            'ŉ' => folded.push_str("ʼn"),
            'ﬀ' => folded.push_str("ff"),
            'ﬁ' => folded.push_str("fi"),
            'ﬂ' => folded.push_str("fl"),
            'ﬃ' => folded.push_str("ffi"),
            'ﬄ' => folded.push_str("ffl"),
            'ﬅ' | 'ﬆ' => folded.push_str("st"),
            _ => folded.push(c),
        }
    }
    folded
}

/// glob 不区分 `*` 与 `**`，连续的星号等同于一个
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_star = false;
    for c in pattern.chars() {
        if c == '*' && prev_star {
            continue;
        }
        prev_star = c == '*';
        out.push(c);
    }
    out
}

impl Matcher {
    /// Builds a matcher from already split patterns.
    ///
    /// `RegExp` accepts exactly one pattern; alternatives must be combined
    /// into a single expression by the caller.
    pub fn new(mode: MatchMode, patterns: Vec<String>, ignore_case: bool) -> FindResult<Self> {
        if mode == MatchMode::RegExp {
            if patterns.len() != 1 {
                return Err(FindError::PatternError {
                    message: format!(
                        "RegExp takes exactly one pattern, got {}",
                        patterns.len()
                    ),
                });
            }
            let pattern = &patterns[0];
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|source| FindError::RegexError {
                    pattern: pattern.clone(),
                    source,
                })?;
            return Ok(Self {
                kind: MatcherKind::RegExp(regex),
                fold_case: false,
            });
        }

        let patterns: Vec<String> = if ignore_case {
            patterns.iter().map(|p| fold_case(p)).collect()
        } else {
            patterns
        };
        let patterns = Arity::from_vec(patterns).ok_or_else(|| FindError::PatternError {
            message: "no pattern given".to_string(),
        })?;

        let kind = match mode {
            MatchMode::Exact => MatcherKind::Exact(patterns),
            MatchMode::Contains => MatcherKind::Contains(patterns),
            MatchMode::StartsWith => MatcherKind::StartsWith(patterns),
            MatchMode::EndsWith => MatcherKind::EndsWith(patterns),
            MatchMode::WildCard => MatcherKind::WildCard(patterns.try_map(|p| {
                Pattern::new(&collapse_stars(&p)).map_err(|e| FindError::PatternError {
                    message: format!("Invalid pattern '{}': {}", p, e),
                })
            })?),
            MatchMode::RegExp => unreachable!("handled above"),
        };

        Ok(Self {
            kind,
            fold_case: ignore_case,
        })
    }

    pub fn mode(&self) -> MatchMode {
        match self.kind {
            MatcherKind::Exact(_) => MatchMode::Exact,
            MatcherKind::Contains(_) => MatchMode::Contains,
            MatcherKind::StartsWith(_) => MatchMode::StartsWith,
            MatcherKind::EndsWith(_) => MatchMode::EndsWith,
            MatcherKind::WildCard(_) => MatchMode::WildCard,
            MatcherKind::RegExp(_) => MatchMode::RegExp,
        }
    }

    /// Number of patterns the matcher ORs together
    pub fn arity(&self) -> usize {
        match &self.kind {
            MatcherKind::Exact(p)
            | MatcherKind::Contains(p)
            | MatcherKind::StartsWith(p)
            | MatcherKind::EndsWith(p) => p.len(),
            MatcherKind::WildCard(p) => p.len(),
            MatcherKind::RegExp(_) => 1,
        }
    }

    pub fn is_match(&self, subject: &str) -> bool {
        if self.fold_case {
            self.is_match_folded(&fold_case(subject))
        } else {
            self.is_match_folded(subject)
        }
    }

    fn is_match_folded(&self, subject: &str) -> bool {
        match &self.kind {
            MatcherKind::Exact(p) => p.iter().any(|s| s == subject),
            MatcherKind::Contains(p) => p.iter().any(|s| subject.contains(s.as_str())),
            MatcherKind::StartsWith(p) => p.iter().any(|s| subject.starts_with(s.as_str())),
            MatcherKind::EndsWith(p) => p.iter().any(|s| subject.ends_with(s.as_str())),
            MatcherKind::WildCard(p) => p
                .iter()
                .any(|w| w.matches_with(subject, WILDCARD_OPTIONS)),
            MatcherKind::RegExp(re) => re.is_match(subject),
        }
    }
}

/// Line-oriented matcher for file contents
#[derive(Debug, Clone)]
pub struct ContentMatcher {
    matcher: Matcher,
}

impl ContentMatcher {
    pub fn new(mode: MatchMode, pattern: String, ignore_case: bool) -> FindResult<Self> {
        if !mode.is_content_mode() {
            return Err(FindError::PatternError {
                message: format!("{} is not supported for content search", mode),
            });
        }
        Ok(Self {
            matcher: Matcher::new(mode, vec![pattern], ignore_case)?,
        })
    }

    pub fn mode(&self) -> MatchMode {
        self.matcher.mode()
    }

    /// Returns true on the first matching line without reading further.
    ///
    /// Read errors end the search and are returned to the caller.
    pub fn matches_lines<I>(&self, lines: I) -> io::Result<bool>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        for line in lines {
            if self.matcher.is_match(&line?) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Open interval `lower < value < upper` with at least one bound present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRange<T> {
    lower: Option<T>,
    upper: Option<T>,
}

impl<T: PartialOrd + Copy> OpenRange<T> {
    /// Returns None when both bounds are absent.
    pub fn new(lower: Option<T>, upper: Option<T>) -> Option<Self> {
        if lower.is_none() && upper.is_none() {
            None
        } else {
            Some(Self { lower, upper })
        }
    }

    pub fn lower(&self) -> Option<T> {
        self.lower
    }

    pub fn upper(&self) -> Option<T> {
        self.upper
    }

    pub fn contains(&self, value: T) -> bool {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => lo < value && value < hi,
            (Some(lo), None) => lo < value,
            (None, Some(hi)) => value < hi,
            (None, None) => unreachable!("OpenRange always has a bound"),
        }
    }

    /// Builds a predicate over any record through an attribute accessor.
    pub fn predicate<R, F>(self, accessor: F) -> impl Fn(&R) -> bool
    where
        F: Fn(&R) -> T,
    {
        move |record| self.contains(accessor(record))
    }
}

//! File filtering functionality
//!
//! Filters are built once per scan from raw user input. Building never
//! touches the file system; a blank input yields `None` (filter inactive)
//! and an invalid one a [`FindError`].

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs::Metadata;
use std::io;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime, TimeZone};

use super::matcher::{fold_case, ContentMatcher, MatchMode, Matcher, OpenRange};
use super::row::{format_time, meta, TypeClass, TIME_FORMAT};
use crate::errors::{FindError, FindResult};

/// Common interface of all filter specs
pub trait FileFilter {
    /// Short filter name such as "Name" or "Size"
    fn label(&self) -> &'static str;

    /// Get the filter description
    fn description(&self) -> String;
}

/// Splits raw input into patterns.
///
/// Items are separated by `sep`, trimmed, and unwrapped from enclosing
/// double quotes. Blank items are dropped; `""` survives as an empty
/// pattern only with `keep_empty_quoted`. Without a separator the whole
/// input is one item.
pub fn split_patterns(raw: &str, sep: Option<char>, keep_empty_quoted: bool) -> Vec<String> {
    fn unquote(item: &str) -> (&str, bool) {
        if item.len() > 1 && item.starts_with('"') && item.ends_with('"') {
            (&item[1..item.len() - 1], true)
        } else {
            (item, false)
        }
    }

    let Some(sep) = sep else {
        let (item, _) = unquote(raw.trim());
        return if item.is_empty() {
            Vec::new()
        } else {
            vec![item.to_string()]
        };
    };

    raw.split(sep)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match unquote(item) {
            ("", true) if !keep_empty_quoted => None,
            (item, _) => Some(item.to_string()),
        })
        .collect()
}

fn polarity(include: bool) -> &'static str {
    if include {
        ""
    } else {
        "Not "
    }
}

/// String pattern filter over names, paths or permission strings
#[derive(Debug, Clone)]
pub struct PatternSpec {
    label: &'static str,
    patterns: Vec<String>,
    ignore_case: bool,
    include: bool,
    matcher: Matcher,
}

impl PatternSpec {
    /// Builds a filter from raw `|`-separated input.
    ///
    /// `RegExp` input is taken verbatim as one expression.
    pub fn parse(
        label: &'static str,
        raw: &str,
        mode: MatchMode,
        ignore_case: bool,
        include: bool,
    ) -> FindResult<Option<Self>> {
        let sep = if mode == MatchMode::RegExp { None } else { Some('|') };
        let patterns = split_patterns(raw, sep, false);
        if patterns.is_empty() {
            return Ok(None);
        }

        let matcher = Matcher::new(mode, patterns.clone(), ignore_case)?;
        Ok(Some(Self {
            label,
            patterns,
            ignore_case,
            include,
            matcher,
        }))
    }

    /// Name filter over the base name
    pub fn name(raw: &str, mode: MatchMode, ignore_case: bool, include: bool) -> FindResult<Option<Self>> {
        Self::parse("Name", raw, mode, ignore_case, include)
    }

    /// Path filter over the full path
    pub fn path(raw: &str, mode: MatchMode, ignore_case: bool, include: bool) -> FindResult<Option<Self>> {
        Self::parse("Path", raw, mode, ignore_case, include)
    }

    /// Mode filter over the permission string, always case-sensitive
    pub fn mode(raw: &str, mode: MatchMode, include: bool) -> FindResult<Option<Self>> {
        Self::parse("MODE", raw, mode, false, include)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_include(&self) -> bool {
        self.include
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Whether an entry with this subject survives the filter
    pub fn keep(&self, subject: &str) -> bool {
        self.matcher.is_match(subject) == self.include
    }
}

impl FileFilter for PatternSpec {
    fn label(&self) -> &'static str {
        self.label
    }

    fn description(&self) -> String {
        format!(
            "{}{} {:?}, {}, IgnoreCase={}",
            polarity(self.include),
            self.label,
            self.patterns,
            self.matcher.mode(),
            self.ignore_case
        )
    }
}

/// Extension filter; extensions include the dot and compare case-insensitively
#[derive(Debug, Clone)]
pub struct ExtensionSpec {
    extensions: HashSet<String>,
    include: bool,
}

impl ExtensionSpec {
    /// `""` in the input stands for "no extension".
    pub fn parse(raw: &str, include: bool) -> FindResult<Option<Self>> {
        let extensions: HashSet<String> = split_patterns(raw, Some('|'), true)
            .iter()
            .map(|ext| fold_case(ext))
            .collect();
        if extensions.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            extensions,
            include,
        }))
    }

    pub fn keep(&self, extension: &str) -> bool {
        self.extensions.contains(&fold_case(extension)) == self.include
    }
}

impl FileFilter for ExtensionSpec {
    fn label(&self) -> &'static str {
        "Extension"
    }

    fn description(&self) -> String {
        let mut extensions: Vec<&String> = self.extensions.iter().collect();
        extensions.sort();
        format!("{}Extension {:?}", polarity(self.include), extensions)
    }
}

/// Type filter over `-`, `d`, `l` and `o`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    classes: BTreeSet<TypeClass>,
}

impl TypeSpec {
    /// Selecting every class makes the filter inactive.
    pub fn new(classes: impl IntoIterator<Item = TypeClass>) -> FindResult<Option<Self>> {
        let classes: BTreeSet<TypeClass> = classes.into_iter().collect();
        if classes.is_empty() {
            return Err(FindError::NothingToSearch("Type"));
        }
        if classes.len() == TypeClass::ALL.len() {
            return Ok(None);
        }
        Ok(Some(Self { classes }))
    }

    /// Parses type characters such as `"-d"`; `f` is accepted for `-`.
    pub fn parse(raw: &str) -> FindResult<Option<Self>> {
        let classes = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',' && *c != '|')
            .map(|c| TypeClass::from_symbol(c).ok_or_else(|| FindError::InvalidFileType(c.to_string())))
            .collect::<FindResult<Vec<_>>>()?;
        Self::new(classes)
    }

    pub fn keep(&self, class: TypeClass) -> bool {
        self.classes.contains(&class)
    }
}

impl FileFilter for TypeSpec {
    fn label(&self) -> &'static str {
        "Type"
    }

    fn description(&self) -> String {
        let symbols: String = self.classes.iter().map(|c| c.symbol()).collect();
        format!("File type: [{}]", symbols)
    }
}

/// Unit applied to size filter input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Bytes,
    /// Powers of 1024 (`K M G T`)
    Binary(u32),
    /// Powers of 1000 (`k m g t`)
    Decimal(u32),
}

impl SizeUnit {
    pub fn factor(self) -> f64 {
        match self {
            SizeUnit::Bytes => 1.0,
            SizeUnit::Binary(exp) => 1024f64.powi(exp as i32),
            SizeUnit::Decimal(exp) => 1000f64.powi(exp as i32),
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BIN: [&str; 5] = ["bytes", "K", "M", "G", "T"];
        const DEC: [&str; 5] = ["bytes", "k", "m", "g", "t"];
        match self {
            SizeUnit::Bytes => f.write_str("bytes"),
            SizeUnit::Binary(exp) => f.write_str(BIN[*exp as usize]),
            SizeUnit::Decimal(exp) => f.write_str(DEC[*exp as usize]),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = FindError;

    /// Case matters: `K` is 1024 bytes, `k` is 1000.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bytes" | "B" | "b" => Ok(SizeUnit::Bytes),
            "K" => Ok(SizeUnit::Binary(1)),
            "M" => Ok(SizeUnit::Binary(2)),
            "G" => Ok(SizeUnit::Binary(3)),
            "T" => Ok(SizeUnit::Binary(4)),
            "k" => Ok(SizeUnit::Decimal(1)),
            "m" => Ok(SizeUnit::Decimal(2)),
            "g" => Ok(SizeUnit::Decimal(3)),
            "t" => Ok(SizeUnit::Decimal(4)),
            other => Err(FindError::InvalidValue {
                field: "size unit",
                value: other.to_string(),
                reason: "expected bytes, K, M, G, T, k, m, g or t".to_string(),
            }),
        }
    }
}

/// Parses a possibly fractional size and scales it to whole bytes.
pub fn parse_size(raw: &str, unit: SizeUnit) -> FindResult<Option<u64>> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: &str| FindError::InvalidValue {
        field: "size",
        value: s.to_string(),
        reason: reason.to_string(),
    };
    let value: f64 = s.parse().map_err(|_| invalid("not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid("must be a non-negative number"));
    }
    // 与 printf 的 %.0f 一致：恰好 .5 时取偶数
    let bytes = (value * unit.factor()).round_ties_even();
    if bytes > u64::MAX as f64 {
        return Err(invalid("too large"));
    }
    Ok(Some(bytes as u64))
}

/// Open size interval in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSpec {
    range: OpenRange<u64>,
}

impl SizeSpec {
    pub fn new(lower: Option<u64>, upper: Option<u64>) -> FindResult<Self> {
        let range = OpenRange::new(lower, upper).ok_or(FindError::MissingBound("Size"))?;
        Ok(Self { range })
    }

    /// Builds the filter from raw bounds; both blank means inactive.
    pub fn parse(lower: &str, upper: &str, unit: SizeUnit) -> FindResult<Option<Self>> {
        let lower = parse_size(lower, unit)?;
        let upper = parse_size(upper, unit)?;
        if lower.is_none() && upper.is_none() {
            return Ok(None);
        }
        Self::new(lower, upper).map(Some)
    }

    pub fn range(&self) -> OpenRange<u64> {
        self.range
    }

    pub fn keep(&self, size: u64) -> bool {
        self.range.contains(size)
    }
}

impl FileFilter for SizeSpec {
    fn label(&self) -> &'static str {
        "Size"
    }

    fn description(&self) -> String {
        let lower = self.range.lower().map(|v| format!("{} < ", v)).unwrap_or_default();
        let upper = self.range.upper().map(|v| format!(" < {}", v)).unwrap_or_default();
        format!("{}SIZE{} (bytes)", lower, upper)
    }
}

/// Which timestamp the time filter compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeField {
    #[default]
    Modified,
    Changed,
    Accessed,
}

impl TimeField {
    pub fn timestamp(self, metadata: &Metadata) -> io::Result<SystemTime> {
        match self {
            TimeField::Modified => metadata.modified(),
            TimeField::Changed => meta::changed(metadata),
            TimeField::Accessed => metadata.accessed(),
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeField::Modified => f.write_str("MTIME"),
            TimeField::Changed => f.write_str("CTIME"),
            TimeField::Accessed => f.write_str("ATIME"),
        }
    }
}

impl FromStr for TimeField {
    type Err = FindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MTIME" => Ok(TimeField::Modified),
            "CTIME" => Ok(TimeField::Changed),
            "ATIME" => Ok(TimeField::Accessed),
            _ => Err(FindError::InvalidValue {
                field: "time field",
                value: s.to_string(),
                reason: "expected MTIME, CTIME or ATIME".to_string(),
            }),
        }
    }
}

/// Parses a local time in `YYYY-MM-DD HH:MM:SS` form.
pub fn parse_time(raw: &str) -> FindResult<Option<SystemTime>> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let invalid = |reason: String| FindError::InvalidValue {
        field: "time",
        value: s.to_string(),
        reason,
    };
    let naive = NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| invalid(format!("{} (expected YYYY-MM-DD HH:MM:SS)", e)))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| invalid("does not exist in the local time zone".to_string()))?;
    Ok(Some(SystemTime::from(local)))
}

/// Open time interval over one timestamp field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    field: TimeField,
    range: OpenRange<SystemTime>,
}

impl TimeSpec {
    pub fn new(field: TimeField, after: Option<SystemTime>, before: Option<SystemTime>) -> FindResult<Self> {
        let range = OpenRange::new(after, before).ok_or(FindError::MissingBound("Time"))?;
        Ok(Self { field, range })
    }

    pub fn parse(field: TimeField, after: &str, before: &str) -> FindResult<Option<Self>> {
        let after = parse_time(after)?;
        let before = parse_time(before)?;
        if after.is_none() && before.is_none() {
            return Ok(None);
        }
        Self::new(field, after, before).map(Some)
    }

    pub fn field(&self) -> TimeField {
        self.field
    }

    pub fn keep(&self, time: SystemTime) -> bool {
        self.range.contains(time)
    }
}

impl FileFilter for TimeSpec {
    fn label(&self) -> &'static str {
        "Time"
    }

    fn description(&self) -> String {
        let lower = self
            .range
            .lower()
            .map(|t| format!("{} < ", format_time(t)))
            .unwrap_or_default();
        let upper = self
            .range
            .upper()
            .map(|t| format!(" < {}", format_time(t)))
            .unwrap_or_default();
        format!("{}{}{}", lower, self.field, upper)
    }
}

/// A set of numeric ids with polarity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSet {
    ids: HashSet<u32>,
    include: bool,
}

impl IdSet {
    /// Parses `|`-separated integers; blank input is `None`.
    pub fn parse(field: &'static str, raw: &str, include: bool) -> FindResult<Option<Self>> {
        let ids = parse_ints(field, raw, Some('|'))?;
        if ids.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            ids: ids.into_iter().collect(),
            include,
        }))
    }

    pub fn keep(&self, id: u32) -> bool {
        self.ids.contains(&id) == self.include
    }

    fn describe(&self, name: &str) -> String {
        let mut ids: Vec<&u32> = self.ids.iter().collect();
        ids.sort();
        format!("{}{} {:?}", polarity(self.include), name, ids)
    }
}

fn parse_ints<T: FromStr>(field: &'static str, raw: &str, sep: Option<char>) -> FindResult<Vec<T>> {
    let items: Vec<&str> = match sep {
        Some(sep) => raw.split(sep).collect(),
        None => vec![raw],
    };
    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>().map_err(|_| FindError::InvalidValue {
                field,
                value: item.to_string(),
                reason: "not a non-negative integer".to_string(),
            })
        })
        .collect()
}

/// Ownership filter by user and group id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSpec {
    uids: Option<IdSet>,
    gids: Option<IdSet>,
}

impl OwnerSpec {
    /// Returns None when neither set is given.
    pub fn new(uids: Option<IdSet>, gids: Option<IdSet>) -> Option<Self> {
        if uids.is_none() && gids.is_none() {
            return None;
        }
        Some(Self { uids, gids })
    }

    pub fn keep(&self, uid: u32, gid: u32) -> bool {
        self.uids.as_ref().map_or(true, |set| set.keep(uid))
            && self.gids.as_ref().map_or(true, |set| set.keep(gid))
    }
}

impl FileFilter for OwnerSpec {
    fn label(&self) -> &'static str {
        "Owner"
    }

    fn description(&self) -> String {
        [
            self.uids.as_ref().map(|s| s.describe("UID")),
            self.gids.as_ref().map(|s| s.describe("GID")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ")
    }
}

/// Keeps entries with more than `n` hard links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinksSpec {
    more_than: u64,
}

impl LinksSpec {
    pub fn new(more_than: u64) -> Self {
        Self { more_than }
    }

    pub fn parse(raw: &str) -> FindResult<Option<Self>> {
        Ok(parse_ints::<u64>("NLINK", raw, None)?.first().copied().map(Self::new))
    }

    pub fn keep(&self, nlink: u64) -> bool {
        nlink > self.more_than
    }
}

impl FileFilter for LinksSpec {
    fn label(&self) -> &'static str {
        "NLINK"
    }

    fn description(&self) -> String {
        format!("NLINK > {}", self.more_than)
    }
}

/// Content filter; one pattern searched line by line in regular files
#[derive(Debug, Clone)]
pub struct ContentSpec {
    pattern: String,
    ignore_case: bool,
    matcher: ContentMatcher,
}

impl ContentSpec {
    /// The whole input is one pattern; `|` is not a separator here.
    pub fn parse(raw: &str, mode: MatchMode, ignore_case: bool) -> FindResult<Self> {
        let pattern = split_patterns(raw, None, false)
            .pop()
            .ok_or(FindError::NothingToSearch("Content"))?;
        let matcher = ContentMatcher::new(mode, pattern.clone(), ignore_case)?;
        Ok(Self {
            pattern,
            ignore_case,
            matcher,
        })
    }

    pub fn matcher(&self) -> &ContentMatcher {
        &self.matcher
    }
}

impl FileFilter for ContentSpec {
    fn label(&self) -> &'static str {
        "Content"
    }

    fn description(&self) -> String {
        format!(
            "Content {:?}, {}, IgnoreCase={}",
            self.pattern,
            self.matcher.mode(),
            self.ignore_case
        )
    }
}

/// One filter of any kind, as accepted by [`FilterSet::push`]
#[derive(Debug, Clone)]
pub enum FilterSpec {
    Name(PatternSpec),
    Path(PatternSpec),
    Extension(ExtensionSpec),
    Type(TypeSpec),
    Size(SizeSpec),
    Time(TimeSpec),
    Owner(OwnerSpec),
    Mode(PatternSpec),
    Links(LinksSpec),
    Content(ContentSpec),
}

/// All active filters of one scan, stored in evaluation order
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub names: Vec<PatternSpec>,
    pub paths: Vec<PatternSpec>,
    pub extension: Option<ExtensionSpec>,
    pub file_type: Option<TypeSpec>,
    pub size: Option<SizeSpec>,
    pub time: Option<TimeSpec>,
    pub owner: Option<OwnerSpec>,
    pub mode: Option<PatternSpec>,
    pub links: Option<LinksSpec>,
    pub content: Option<ContentSpec>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, label: &'static str) -> FindResult<()> {
    if slot.is_some() {
        return Err(FindError::DuplicateFilter(label));
    }
    *slot = Some(value);
    Ok(())
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter. Name and path filters may repeat; every other
    /// kind can be set once.
    pub fn push(&mut self, spec: FilterSpec) -> FindResult<()> {
        match spec {
            FilterSpec::Name(s) => self.names.push(s),
            FilterSpec::Path(s) => self.paths.push(s),
            FilterSpec::Extension(s) => set_once(&mut self.extension, s, "Extension")?,
            FilterSpec::Type(s) => set_once(&mut self.file_type, s, "Type")?,
            FilterSpec::Size(s) => set_once(&mut self.size, s, "Size")?,
            FilterSpec::Time(s) => set_once(&mut self.time, s, "Time")?,
            FilterSpec::Owner(s) => set_once(&mut self.owner, s, "Owner")?,
            FilterSpec::Mode(s) => set_once(&mut self.mode, s, "MODE")?,
            FilterSpec::Links(s) => set_once(&mut self.links, s, "NLINK")?,
            FilterSpec::Content(s) => set_once(&mut self.content, s, "Content")?,
        }
        Ok(())
    }

    pub fn with(mut self, spec: FilterSpec) -> FindResult<Self> {
        self.push(spec)?;
        Ok(self)
    }

    /// Whether evaluation needs the entry's metadata
    pub fn needs_stat(&self) -> bool {
        self.size.is_some()
            || self.time.is_some()
            || self.owner.is_some()
            || self.mode.is_some()
            || self.links.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    /// Active filters in evaluation order
    pub fn active(&self) -> Vec<&dyn FileFilter> {
        let mut out: Vec<&dyn FileFilter> = Vec::new();
        out.extend(self.names.iter().map(|f| f as &dyn FileFilter));
        out.extend(self.paths.iter().map(|f| f as &dyn FileFilter));
        if let Some(f) = &self.extension {
            out.push(f);
        }
        if let Some(f) = &self.file_type {
            out.push(f);
        }
        if let Some(f) = &self.size {
            out.push(f);
        }
        if let Some(f) = &self.time {
            out.push(f);
        }
        if let Some(f) = &self.owner {
            out.push(f);
        }
        if let Some(f) = &self.mode {
            out.push(f);
        }
        if let Some(f) = &self.links {
            out.push(f);
        }
        if let Some(f) = &self.content {
            out.push(f);
        }
        out
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.active().iter().map(|f| f.description()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_split_patterns() {
        assert_eq!(split_patterns(" a | b ||c ", Some('|'), false), vec!["a", "b", "c"]);
        assert_eq!(split_patterns(r#""a b" | "x""#, Some('|'), false), vec!["a b", "x"]);
        assert_eq!(split_patterns(r#".txt | """#, Some('|'), false), vec![".txt"]);
        assert_eq!(split_patterns(r#".txt | """#, Some('|'), true), vec![".txt", ""]);
        assert_eq!(split_patterns(r#"  "a|b"  "#, None, false), vec!["a|b"]);
        assert!(split_patterns("   ", None, false).is_empty());
        assert!(split_patterns(" | ", Some('|'), false).is_empty());
    }

    #[test]
    fn test_pattern_spec_blank_is_inactive() -> Result<(), Box<dyn std::error::Error>> {
        assert!(PatternSpec::name("  ", MatchMode::Contains, false, true)?.is_none());
        Ok(())
    }

    #[test]
    fn test_pattern_spec_polarity() -> Result<(), Box<dyn std::error::Error>> {
        let not_b = PatternSpec::name("b", MatchMode::Contains, true, false)?.unwrap();
        assert!(not_b.keep("a.txt"));
        assert!(not_b.keep("c.log"));
        assert!(!not_b.keep("B.txt"));

        let only_b = PatternSpec::name("b", MatchMode::Contains, true, true)?.unwrap();
        assert!(only_b.keep("B.txt"));
        assert!(!only_b.keep("a.txt"));
        Ok(())
    }

    #[test]
    fn test_pattern_spec_arity() -> Result<(), Box<dyn std::error::Error>> {
        let one = PatternSpec::name("*.rs", MatchMode::WildCard, false, true)?.unwrap();
        assert_eq!(one.matcher().arity(), 1);

        let many = PatternSpec::name("*.rs | *.toml", MatchMode::WildCard, false, true)?.unwrap();
        assert_eq!(many.matcher().arity(), 2);
        assert!(many.keep("Cargo.toml"));
        Ok(())
    }

    #[test]
    fn test_pattern_spec_regexp_is_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let spec = PatternSpec::name(r"^(a|b)\.txt$", MatchMode::RegExp, false, true)?.unwrap();
        assert_eq!(spec.patterns(), [r"^(a|b)\.txt$"]);
        assert!(spec.keep("b.txt"));
        assert!(!spec.keep("c.txt"));

        let err = PatternSpec::name("(unclosed", MatchMode::RegExp, false, true).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
        Ok(())
    }

    #[test]
    fn test_mode_spec_is_case_sensitive() -> Result<(), Box<dyn std::error::Error>> {
        let spec = PatternSpec::mode("-rwS*", MatchMode::WildCard, true)?.unwrap();
        assert!(spec.keep("-rwSr--r--"));
        assert!(!spec.keep("-rwsr--r--"));
        Ok(())
    }

    #[test]
    fn test_extension_spec() -> Result<(), Box<dyn std::error::Error>> {
        let spec = ExtensionSpec::parse(".TXT | \"\"", true)?.unwrap();
        assert!(spec.keep(".txt"));
        assert!(spec.keep(""));
        assert!(!spec.keep(".log"));

        let spec = ExtensionSpec::parse(".txt", false)?.unwrap();
        assert!(!spec.keep(".Txt"));
        assert!(spec.keep(".log"));

        assert!(ExtensionSpec::parse("", true)?.is_none());
        Ok(())
    }

    #[test]
    fn test_type_spec() -> Result<(), Box<dyn std::error::Error>> {
        let spec = TypeSpec::parse("-")?.unwrap();
        assert!(spec.keep(TypeClass::Regular));
        assert!(!spec.keep(TypeClass::Directory));

        assert!(TypeSpec::parse("-dlo")?.is_none());
        assert!(matches!(TypeSpec::parse(""), Err(FindError::NothingToSearch(_))));
        assert!(matches!(TypeSpec::parse("x"), Err(FindError::InvalidFileType(_))));
        Ok(())
    }

    #[test]
    fn test_size_units() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(parse_size("2", "K".parse()?)?, Some(2048));
        assert_eq!(parse_size("2", "k".parse()?)?, Some(2000));
        assert_eq!(parse_size("1.5", "K".parse()?)?, Some(1536));
        assert_eq!(parse_size("0.5", "bytes".parse()?)?, Some(0));
        assert_eq!(parse_size("1.5", "bytes".parse()?)?, Some(2));
        assert_eq!(parse_size("2.5", "bytes".parse()?)?, Some(2));
        assert_eq!(parse_size("2.6", "bytes".parse()?)?, Some(3));
        assert_eq!(parse_size("1", "M".parse()?)?, Some(1 << 20));
        assert_eq!(parse_size(" ", SizeUnit::Bytes)?, None);
        assert!(parse_size("-1", SizeUnit::Bytes).is_err());
        assert!(parse_size("abc", SizeUnit::Bytes).is_err());
        assert!("X".parse::<SizeUnit>().is_err());
        Ok(())
    }

    #[test]
    fn test_size_spec_open_interval() -> Result<(), Box<dyn std::error::Error>> {
        let spec = SizeSpec::parse("1", "", "K".parse()?)?.unwrap();
        assert!(spec.keep(2048));
        assert!(!spec.keep(1024));

        assert!(SizeSpec::parse("", "", SizeUnit::Bytes)?.is_none());
        assert!(matches!(SizeSpec::new(None, None), Err(FindError::MissingBound("Size"))));
        Ok(())
    }

    #[test]
    fn test_time_spec() -> Result<(), Box<dyn std::error::Error>> {
        let after = parse_time("2020-01-01 00:00:00")?.unwrap();
        let spec = TimeSpec::parse(TimeField::Modified, "2020-01-01 00:00:00", "")?.unwrap();
        assert!(spec.keep(after + Duration::from_secs(1)));
        assert!(!spec.keep(after));
        assert_eq!(spec.field(), TimeField::Modified);

        assert!(parse_time("2020-13-01 00:00:00").is_err());
        assert!(parse_time("yesterday").is_err());
        assert!(TimeSpec::parse(TimeField::Accessed, " ", "")?.is_none());
        assert_eq!("ctime".parse::<TimeField>()?, TimeField::Changed);
        Ok(())
    }

    #[test]
    fn test_owner_spec() -> Result<(), Box<dyn std::error::Error>> {
        let uids = IdSet::parse("UID", "0 | 1000", true)?;
        let gids = IdSet::parse("GID", "5", false)?;
        let spec = OwnerSpec::new(uids, gids).unwrap();
        assert!(spec.keep(1000, 100));
        assert!(!spec.keep(1000, 5));
        assert!(!spec.keep(42, 100));

        assert!(OwnerSpec::new(None, IdSet::parse("GID", "", true)?).is_none());
        assert!(IdSet::parse("UID", "root", true).is_err());
        Ok(())
    }

    #[test]
    fn test_links_spec() -> Result<(), Box<dyn std::error::Error>> {
        let spec = LinksSpec::parse("1")?.unwrap();
        assert!(spec.keep(2));
        assert!(!spec.keep(1));
        assert!(LinksSpec::parse("")?.is_none());
        assert!(LinksSpec::parse("1 | 2").is_err());
        Ok(())
    }

    #[test]
    fn test_content_spec() -> Result<(), Box<dyn std::error::Error>> {
        let spec = ContentSpec::parse("a|b", MatchMode::Contains, false)?;
        assert!(spec.matcher().matches_lines(vec![Ok("xa|by".to_string())])?);
        assert!(matches!(
            ContentSpec::parse("  ", MatchMode::Contains, false),
            Err(FindError::NothingToSearch("Content"))
        ));
        assert!(ContentSpec::parse("x", MatchMode::Exact, false).is_err());
        Ok(())
    }

    #[test]
    fn test_filter_set() -> Result<(), Box<dyn std::error::Error>> {
        let mut filters = FilterSet::new();
        assert!(filters.is_empty());

        filters.push(FilterSpec::Name(PatternSpec::name("a", MatchMode::Contains, false, true)?.unwrap()))?;
        filters.push(FilterSpec::Name(PatternSpec::name("b", MatchMode::Contains, false, false)?.unwrap()))?;
        assert!(!filters.needs_stat());

        filters.push(FilterSpec::Size(SizeSpec::new(Some(1), None)?))?;
        assert!(filters.needs_stat());
        assert!(matches!(
            filters.push(FilterSpec::Size(SizeSpec::new(None, Some(5))?)),
            Err(FindError::DuplicateFilter("Size"))
        ));

        let descriptions = filters.descriptions();
        assert_eq!(descriptions.len(), 3);
        assert!(descriptions[1].starts_with("Not Name"));
        assert_eq!(descriptions[2], "1 < SIZE (bytes)");
        Ok(())
    }
}

//! Ordered include/exclude glob rules scoped to a source/destination pair.
//!
//! A [`PatternMatcher`] owns the raw (macro expanded) patterns of one file
//! group. [`PatternMatcher::create_filter`] compiles them into a
//! [`MatcherFilter`], whose verdict for a path is the verdict of the last
//! rule matching it. Paths no rule matches are excluded.

use super::{Error, Result, settings::FilePattern};
use glob::{MatchOptions, Pattern};
use path_absolutize::Absolutize;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Pattern that selects everything below a matcher's source.
pub const ALL_FILES_PATTERN: &str = "**/*";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expands `${field}` tokens of a raw pattern.
pub type MacroExpander = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Paths claimed by other matchers, relative to a common root.
///
/// Built before any copy begins so the main file set never places a file an
/// extra group will place later.
#[derive(Debug, Default)]
pub struct SharedExcludes {
    root: PathBuf,
    patterns: Vec<Pattern>,
}

impl SharedExcludes {
    /// Creates the list from patterns collected with
    /// [`PatternMatcher::compute_parsed_patterns`].
    pub fn new(root: impl Into<PathBuf>, patterns: Vec<Pattern>) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no path is claimed.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `path` (absolute) is claimed.
    pub fn matches(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rel) => {
                let rel = to_slash(rel);
                self.patterns
                    .iter()
                    .any(|p| p.matches_with(&rel, MATCH_OPTIONS))
            }
            Err(_) => false,
        }
    }
}

/// A source directory, a destination directory and ordered glob rules.
#[derive(Clone)]
pub struct PatternMatcher {
    /// Source directory (or file)
    pub from: PathBuf,
    /// Destination directory (or file)
    pub to: PathBuf,
    patterns: Vec<String>,
    expander: MacroExpander,
    /// Paths claimed by other groups
    pub exclude_patterns: Option<Arc<SharedExcludes>>,
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("patterns", &self.patterns)
            .field(
                "exclude_patterns",
                &self.exclude_patterns.as_ref().map(|e| e.len()),
            )
            .finish()
    }
}

impl PatternMatcher {
    /// Creates a matcher, macro-expanding every pattern.
    pub fn new(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        expander: MacroExpander,
        patterns: &[String],
    ) -> Result<Self> {
        let mut matcher = Self {
            from: from.into(),
            to: to.into(),
            patterns: Vec::with_capacity(patterns.len()),
            expander,
            exclude_patterns: None,
        };
        for pattern in patterns {
            matcher.add_pattern(pattern)?;
        }
        Ok(matcher)
    }

    /// Appends a pattern (`!` prefix for exclusion).
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let expanded = (self.expander)(pattern)?;
        self.patterns.push(normalize_pattern(&expanded));
        Ok(())
    }

    /// Inserts a pattern before all existing ones.
    pub fn prepend_pattern(&mut self, pattern: &str) -> Result<()> {
        let expanded = (self.expander)(pattern)?;
        self.patterns.insert(0, normalize_pattern(&expanded));
        Ok(())
    }

    /// Patterns in evaluation order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether no pattern was given; callers substitute [`ALL_FILES_PATTERN`].
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether every pattern is an exclusion.
    pub fn contains_only_ignore(&self) -> bool {
        !self.is_empty() && self.patterns.iter().all(|p| p.starts_with('!'))
    }

    /// Appends the paths this matcher claims, relative to `root_dir`, to
    /// `result`.
    ///
    /// A matcher without patterns claims its whole source. Exclusion rules
    /// claim nothing.
    pub fn compute_parsed_patterns(&self, result: &mut Vec<Pattern>, root_dir: &Path) -> Result<()> {
        let Ok(relative_from) = self.from.strip_prefix(root_dir) else {
            log::debug!(
                "{} is outside of {}, nothing to exclude",
                self.from.display(),
                root_dir.display()
            );
            return Ok(());
        };
        let relative_from = to_slash(relative_from);

        if self.patterns.is_empty() {
            if !relative_from.is_empty() {
                let escaped = Pattern::escape(&relative_from);
                result.push(Pattern::new(&escaped)?);
                result.push(Pattern::new(&format!("{escaped}/**/*"))?);
            }
            return Ok(());
        }

        for pattern in self.patterns.iter().filter(|p| !p.starts_with('!')) {
            let joined = if relative_from.is_empty() {
                pattern.clone()
            } else {
                format!("{}/{pattern}", Pattern::escape(&relative_from))
            };
            for rule in compile_rule_text(&joined) {
                result.push(Pattern::new(&rule)?);
            }
        }
        Ok(())
    }

    /// Compiles the rules into a decision function.
    pub fn create_filter(&self) -> Result<MatcherFilter> {
        MatcherFilter::compile(&self.from, &self.patterns, self.exclude_patterns.clone())
    }
}

#[derive(Debug)]
struct Rule {
    pattern: Pattern,
    negate: bool,
    literal_prefix: String,
}

/// Compiled form of a [`PatternMatcher`].
#[derive(Debug)]
pub struct MatcherFilter {
    base: PathBuf,
    rules: Vec<Rule>,
    excludes: Option<Arc<SharedExcludes>>,
    trailing_denylist: Vec<Pattern>,
}

impl MatcherFilter {
    fn compile(
        base: &Path,
        patterns: &[String],
        excludes: Option<Arc<SharedExcludes>>,
    ) -> Result<Self> {
        let mut rules = Vec::new();
        for raw in patterns {
            let (negate, body) = match raw.strip_prefix('!') {
                Some(body) => (true, body),
                None => (false, raw.as_str()),
            };
            for text in compile_rule_text(body) {
                rules.push(Rule {
                    literal_prefix: literal_prefix(&text).to_string(),
                    pattern: Pattern::new(&text)?,
                    negate,
                });
            }
        }
        Ok(Self {
            base: base.to_path_buf(),
            rules,
            excludes,
            trailing_denylist: Vec::new(),
        })
    }

    /// Adds fixed exclusion patterns evaluated after every user rule.
    pub fn with_trailing_denylist(mut self, patterns: &[&str]) -> Result<Self> {
        for raw in patterns {
            for text in compile_rule_text(raw) {
                self.trailing_denylist.push(Pattern::new(&text)?);
            }
        }
        Ok(self)
    }

    /// Whether the file at `path` belongs to the set.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.excludes.as_ref().is_some_and(|e| e.matches(path)) {
            return false;
        }
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let rel = to_slash(rel);

        if !matches!(self.decide(&rel), Some((true, _))) {
            return false;
        }
        !self
            .trailing_denylist
            .iter()
            .any(|p| p.matches_with(&rel, MATCH_OPTIONS))
    }

    /// Whether the walk should enter the directory at `path`.
    ///
    /// A directory is pruned when it is claimed by another group, matched
    /// by the fixed denylist, or excluded by a rule that no later include
    /// rule could override below it.
    pub fn should_descend(&self, path: &Path) -> bool {
        if self.excludes.as_ref().is_some_and(|e| e.matches(path)) {
            return false;
        }
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let rel = to_slash(rel);
        if rel.is_empty() {
            return true;
        }
        if self
            .trailing_denylist
            .iter()
            .any(|p| p.matches_with(&rel, MATCH_OPTIONS))
        {
            return false;
        }

        match self.decide(&rel) {
            Some((false, index)) => {
                let dir_prefix = format!("{rel}/");
                self.rules[index + 1..].iter().any(|rule| {
                    !rule.negate
                        && (rule.literal_prefix.starts_with(&dir_prefix)
                            || dir_prefix.starts_with(&rule.literal_prefix))
                })
            }
            _ => true,
        }
    }

    /// Verdict and index of the last rule matching `rel`.
    fn decide(&self, rel: &str) -> Option<(bool, usize)> {
        self.rules
            .iter()
            .enumerate()
            .rev()
            .find(|(_, rule)| rule.pattern.matches_with(rel, MATCH_OPTIONS))
            .map(|(index, rule)| (!rule.negate, index))
    }
}

/// Builds matchers for a configuration group (`files`, `extra_resources`,
/// `extra_files`).
///
/// Plain patterns go to a default matcher from `default_src` to
/// `destination`; `{ from, to, filter }` entries get their own matcher with
/// `from` resolved against `default_src` and `to` against `destination`.
pub fn get_file_matchers(
    entries: &[FilePattern],
    default_src: &Path,
    destination: &Path,
    expander: &MacroExpander,
) -> Result<Vec<PatternMatcher>> {
    let mut default_matcher =
        PatternMatcher::new(default_src, destination, expander.clone(), &[])?;
    let mut matchers = Vec::new();

    for entry in entries {
        match entry {
            FilePattern::Pattern(pattern) => default_matcher.add_pattern(pattern)?,
            FilePattern::Set { from, to, filter } => {
                let from = match from {
                    Some(from) => resolve_path(default_src, &expander(from)?)?,
                    None => default_src.to_path_buf(),
                };
                let to = match to {
                    Some(to) => resolve_path(destination, &expander(to)?)?,
                    None => destination.to_path_buf(),
                };
                matchers.push(PatternMatcher::new(from, to, expander.clone(), filter)?);
            }
        }
    }

    if !default_matcher.is_empty() {
        matchers.insert(0, default_matcher);
    }
    Ok(matchers)
}

/// Joins `relative` onto `base` and normalizes `.`/`..` components.
pub fn resolve_path(base: &Path, relative: &str) -> Result<PathBuf> {
    let joined = base.join(relative);
    let resolved = joined.absolutize().map_err(Error::IoError)?;
    Ok(resolved.into_owned())
}

/// Expands braces of a `{a,b}` group into separate patterns.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + offset);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(open + offset),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };
    if splits.is_empty() {
        // `{x}` has no alternatives; keep it literal and expand the rest
        let (head, tail) = pattern.split_at(close + 1);
        return expand_braces(tail)
            .into_iter()
            .map(|rest| format!("{head}{rest}"))
            .collect();
    }

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{prefix}{alternative}{suffix}"))
        })
        .collect()
}

/// Turns one pattern into the glob texts it stands for.
///
/// A pattern without glob magic and without a dot names a directory, so it
/// also matches everything below it.
fn compile_rule_text(body: &str) -> Vec<String> {
    let mut texts = Vec::new();
    for variant in expand_braces(body) {
        let variant = variant.trim_start_matches("./").trim_start_matches('/');
        let variant = variant.trim_end_matches('/');
        if variant.is_empty() {
            continue;
        }
        texts.push(variant.to_string());
        if !has_magic(variant) && !variant.contains('.') {
            texts.push(format!("{variant}/**/*"));
        }
    }
    texts
}

fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();
    match pattern.strip_prefix('!') {
        Some(body) => format!("!{}", body.trim_start_matches("./")),
        None => pattern.trim_start_matches("./").to_string(),
    }
}

fn has_magic(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(['*', '?', '[']) {
        Some(index) => &pattern[..index],
        None => pattern,
    }
}

/// Relative path with `/` separators.
pub(crate) fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for (i, component) in path.components().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

//! Branch naming
//!
//! Task branches are `prefix/slug`. The slug doubles as the task id, so the
//! sanitizing rules here are a stable contract: lowercase ASCII alphanumerics,
//! runs of anything else collapsed to one hyphen, no leading or trailing
//! hyphen, and the whole branch kept within an operational length ceiling.

use regex::Regex;
use std::sync::LazyLock;

/// Ceiling on `prefix/slug`, long enough for readable names and short enough
/// for every tool that embeds branch names.
pub const DEFAULT_MAX_BRANCH_LEN: usize = 58;

const FALLBACK_SLUG: &str = "task";

/// A sanitized branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchName {
    /// Sanitized prefix (may be empty)
    pub prefix: String,
    /// Sanitized, truncated title
    pub slug: String,
}

impl BranchName {
    /// Full branch name, `prefix/slug` or just `slug` without a prefix.
    pub fn full(&self) -> String {
        if self.prefix.is_empty() {
            self.slug.clone()
        } else {
            format!("{}/{}", self.prefix, self.slug)
        }
    }

    /// The name for relaunch `attempt`, suffixed `-N` from the second
    /// attempt on and still within `max_len`.
    pub fn attempt(&self, attempt: u32, max_len: usize) -> BranchName {
        if attempt <= 1 {
            return self.clone();
        }
        let suffix = format!("-{attempt}");
        let separator = usize::from(!self.prefix.is_empty());
        let budget = max_len
            .saturating_sub(self.prefix.len() + separator + suffix.len())
            .max(1);
        BranchName {
            prefix: self.prefix.clone(),
            slug: format!("{}{}", trim_to(&self.slug, budget), suffix),
        }
    }
}

/// Sanitize `title` under `prefix` with the default length ceiling.
pub fn sanitize(title: &str, prefix: &str) -> String {
    sanitize_with_limit(title, prefix, DEFAULT_MAX_BRANCH_LEN).full()
}

/// Sanitize `title` under `prefix` so the full branch fits in `max_len`.
pub fn sanitize_with_limit(title: &str, prefix: &str, max_len: usize) -> BranchName {
    let mut prefix = prefix
        .split('/')
        .map(slugify)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    // The prefix may never eat the whole budget.
    let prefix_budget = max_len / 2;
    if prefix.len() > prefix_budget {
        prefix = trim_to(&prefix, prefix_budget);
    }

    let separator = usize::from(!prefix.is_empty());
    let slug_budget = max_len.saturating_sub(prefix.len() + separator).max(1);

    let mut slug = trim_to(&slugify(title), slug_budget);
    if slug.is_empty() {
        slug = trim_to(FALLBACK_SLUG, slug_budget);
    }

    BranchName { prefix, slug }
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Truncate an ASCII slug and strip any hyphens left dangling at either end.
fn trim_to(slug: &str, max: usize) -> String {
    let cut = if slug.len() > max { &slug[..max] } else { slug };
    cut.trim_matches(|c| c == '-' || c == '/').to_string()
}

/// Coarse task category inferred from the title, used for branch prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Bugfix,
    Refactor,
    Test,
    Documentation,
    Infrastructure,
    Feature,
    Unknown,
}

static KIND_PATTERNS: LazyLock<Vec<(TaskKind, Regex)>> = LazyLock::new(|| {
    [
        (TaskKind::Bugfix, r"(?i)\b(fix|bug|broken|error)\b"),
        (TaskKind::Refactor, r"(?i)\b(refactor|restructur\w*|clean\s*up)\b"),
        (TaskKind::Test, r"(?i)\b(tests?|spec|coverage)\b"),
        (TaskKind::Documentation, r"(?i)\b(document\w*|readme)\b"),
        (TaskKind::Infrastructure, r"(?i)\b(deploy\w*|docker\w*|migration)\b"),
        (TaskKind::Feature, r"(?i)\b(add|implement\w*|create|new)\b"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| Regex::new(pattern).ok().map(|re| (kind, re)))
    .collect()
});

impl TaskKind {
    /// First matching category, checked in a fixed order.
    pub fn classify(title: &str) -> Self {
        KIND_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(title))
            .map_or(Self::Unknown, |(kind, _)| *kind)
    }

    pub fn branch_prefix(self) -> &'static str {
        match self {
            Self::Bugfix => "fix",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Documentation => "docs",
            Self::Infrastructure => "infra",
            Self::Feature => "feature",
            Self::Unknown => "task",
        }
    }
}

//! Disposable-domain and blacklist classification (no I/O).
//!
//! Two independent, case-insensitive exact-match membership checks against
//! configured sets. No subdomain wildcarding: `mail.mailinator.com` is not a
//! match for `mailinator.com`. The sets are plain data files, swappable
//! without a code change.

use std::collections::HashSet;

use tracing::{info, warn};

/// Bundled disposable-provider list, one domain per line.
pub const BUNDLED_DISPOSABLE_LIST: &str = include_str!("../data/disposable_domains.txt");
/// Bundled blacklist, one domain per line.
pub const BUNDLED_BLACKLIST: &str = include_str!("../data/blacklisted_domains.txt");

/// Classifies domains against the disposable-provider and blacklist sets.
pub struct DomainClassifier {
    disposable: HashSet<String>,
    blacklist: HashSet<String>,
}

impl DomainClassifier {
    pub fn new(disposable: HashSet<String>, blacklist: HashSet<String>) -> Self {
        info!(
            disposable = disposable.len(),
            blacklisted = blacklist.len(),
            "domain classifier initialized"
        );
        Self {
            disposable,
            blacklist,
        }
    }

    /// Build a classifier from the bundled data files.
    pub fn bundled() -> Self {
        Self::from_lists(BUNDLED_DISPOSABLE_LIST, BUNDLED_BLACKLIST)
    }

    /// Build a classifier from two list files (one domain per line, `#`
    /// comments and blank lines ignored).
    pub fn from_lists(disposable: &str, blacklist: &str) -> Self {
        Self::new(parse_domain_list(disposable), parse_domain_list(blacklist))
    }

    /// Exact, case-insensitive membership in the disposable-provider set.
    pub fn is_disposable(&self, domain: &str) -> bool {
        self.disposable.contains(&domain.to_ascii_lowercase())
    }

    /// Exact, case-insensitive membership in the blacklist.
    pub fn is_blacklisted(&self, domain: &str) -> bool {
        self.blacklist.contains(&domain.to_ascii_lowercase())
    }

    pub fn disposable_count(&self) -> usize {
        self.disposable.len()
    }

    pub fn blacklist_count(&self) -> usize {
        self.blacklist.len()
    }
}

/// Parse a domain list: one domain per line, trimmed and lower-cased.
/// Entries that do not look like domains are skipped with a warning.
pub fn parse_domain_list(content: &str) -> HashSet<String> {
    let mut domains = HashSet::new();
    let mut invalid = 0usize;

    for (line_no, line) in content.lines().enumerate() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        if looks_like_domain(entry) {
            domains.insert(entry.to_ascii_lowercase());
        } else {
            invalid += 1;
            if invalid <= 10 {
                warn!(line = line_no + 1, entry, "skipping malformed domain entry");
            }
        }
    }

    if invalid > 10 {
        warn!(skipped = invalid - 10, "further malformed entries skipped");
    }

    domains
}

fn looks_like_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

//! Structural address validation (no I/O).
//!
//! The accepted grammar is `local-part "@" domain-label "." tld` with a TLD
//! of at least two ASCII letters. Internationalized domains are a non-goal
//! and are rejected rather than silently mishandled.

/// A parsed email address. Immutable once parsed; the domain is lower-cased
/// so every downstream lookup and classification is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    raw: String,
    local_part: String,
    domain: String,
}

impl Address {
    /// Parse a raw string against the structural grammar.
    ///
    /// Fails closed: empty input, a missing `@`, multiple `@`, or any
    /// character outside the accepted sets yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let mut parts = raw.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return None,
        };

        if !is_valid_local_part(local) || !is_valid_domain(domain) {
            return None;
        }

        Some(Self {
            raw: raw.to_owned(),
            local_part: local.to_owned(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// Lower-cased domain, used for all lookups and classification.
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// ASCII letters/digits and `. _ % + -` only.
fn is_valid_local_part(local: &str) -> bool {
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    let mut labels = domain.split('.').peekable();
    while let Some(label) = labels.next() {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        let is_tld = labels.peek().is_none();
        if is_tld {
            // TLD: at least two ASCII letters.
            if label.len() < 2 || !label.chars().all(|c| c.is_ascii_alphabetic()) {
                return false;
            }
        } else if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_common_addresses() {
        for raw in [
            "user@example.com",
            "first.last@example.co.uk",
            "user+tag@example.com",
            "user_name%ext@sub.example.org",
            "u-ser@test-domain.io",
        ] {
            assert!(Address::parse(raw).is_some(), "expected valid: {raw}");
        }
    }

    #[test]
    fn rejects_structural_failures() {
        for raw in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@@example.com",
            "a@b@example.com",
            "user@nodot",
            "user@example.c",
            "user@.example.com",
            "user@example.com.",
            "user@-example.com",
            "user@example.com-",
            "user@example.123",
            "us er@example.com",
            "user@exämple.com",
            "üser@example.com",
        ] {
            assert!(Address::parse(raw).is_none(), "expected invalid: {raw}");
        }
    }

    #[test]
    fn domain_is_lowercased() {
        let addr = Address::parse("User@EXAMPLE.Com").expect("valid");
        assert_eq!(addr.domain(), "example.com");
        assert_eq!(addr.local_part(), "User");
        assert_eq!(addr.raw(), "User@EXAMPLE.Com");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let addr = Address::parse("  user@example.com \n").expect("valid");
        assert_eq!(addr.raw(), "user@example.com");
    }
}

//! Email normalization shared by account and application handling.

use crate::error::{DomainError, DomainResult};

/// Trim, lowercase and sanity-check an email address.
///
/// Full RFC 5322 parsing is deliberately out of scope; the mail provider is
/// the final arbiter of deliverability. Every path that keys on an email
/// (duplicate detection, member lookup) must go through this so the keys
/// agree.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();

    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("email is missing '@'"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(DomainError::validation("invalid email format"));
    }
    if email.contains(char::is_whitespace) {
        return Err(DomainError::validation("email contains whitespace"));
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Dara@Example.SE ").unwrap(), "dara@example.se");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "no-at-sign", "@x.se", "a@", "a@nodot", "a b@x.se"] {
            assert!(normalize_email(bad).is_err(), "{bad:?}");
        }
    }
}

//! Certificate subject classification
//!
//! Decides whether a hostname, IP or wildcard can have a certificate at all,
//! whether a public CA would issue it, and how wildcard patterns match.

use std::net::IpAddr;

/// Characters that never appear in a certificate subject
const FORBIDDEN_CHARS: &[char] = &[
    '(', ')', '[', ']', '{', '}', '<', '>', ' ', '\t', '\n', '"', '\\', '!', '@', '#', '$', '%',
    '^', '&', '|', ';', '\'', '+', '=',
];

/// Suffixes of names that only resolve on private networks
const INTERNAL_SUFFIXES: &[&str] = &[".localhost", ".local", ".internal", ".home.arpa"];

/// Whether `subject` is acceptable for any certificate, public or internal
pub fn qualifies_for_cert(subject: &str) -> bool {
    !subject.trim().is_empty()
        && !subject.starts_with('.')
        && !subject.ends_with('.')
        // a wildcard must be the whole left-most label (or exactly "*")
        && (!subject.contains('*') || subject.starts_with("*.") || subject == "*")
        && !subject.contains(FORBIDDEN_CHARS)
}

/// Whether a public CA could issue a certificate for `subject`
pub fn qualifies_for_public_cert(subject: &str) -> bool {
    qualifies_for_cert(subject)
        && !is_internal(subject)
        && !is_ip(subject)
        // one left-most wildcard label, with at least three labels overall
        && (!subject.contains('*')
            || (subject.matches('*').count() == 1
                && subject.matches('.').count() > 1
                && subject.len() > 2
                && subject.starts_with("*.")))
}

/// Whether `subject` is an IP address
pub fn is_ip(subject: &str) -> bool {
    let trimmed = subject
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(subject);
    trimmed.parse::<IpAddr>().is_ok()
}

/// Whether `subject` is a name only meaningful on a private network
pub fn is_internal(subject: &str) -> bool {
    let name = subject.strip_suffix('.').unwrap_or(subject).to_ascii_lowercase();
    name == "localhost" || INTERNAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Whether `subject` has two or more wildcard labels, like `*.*.example.com`
pub fn is_multi_wildcard(subject: &str) -> bool {
    subject.matches("*.").count() >= 2
}

/// Whether `subject` should get a certificate from the internal issuer
///
/// On-demand issuance never requests wildcards, so multi-wildcard patterns
/// stay on the public path when `on_demand` is set.
pub fn wants_internal_issuer(subject: &str, on_demand: bool) -> bool {
    is_ip(subject) || is_internal(subject) || (is_multi_wildcard(subject) && !on_demand)
}

/// Whether `subject` is matched by `wildcard`
///
/// Labels of the subject are replaced by `*` from the left, one at a time
/// and cumulatively, and each candidate is compared with the wildcard.
pub fn match_wildcard(subject: &str, wildcard: &str) -> bool {
    let subject = subject.to_ascii_lowercase();
    let wildcard = wildcard.to_ascii_lowercase();
    if subject == wildcard {
        return true;
    }
    if !wildcard.contains('*') {
        return false;
    }

    let mut labels: Vec<&str> = subject.split('.').collect();
    for i in 0..labels.len() {
        if labels[i].is_empty() {
            continue;
        }
        labels[i] = "*";
        if labels.join(".") == wildcard {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualifies_for_cert() {
        for ok in ["example.com", "*.example.com", "*", "localhost", "127.0.0.1", "a.b.c.d"] {
            assert!(qualifies_for_cert(ok), "{ok} should qualify");
        }
        for bad in ["", "  ", ".example.com", "example.com.", "foo.*.com", "a b.com", "a@b.com", "x{y}.com"] {
            assert!(!qualifies_for_cert(bad), "{bad:?} should not qualify");
        }
    }

    #[test]
    fn test_qualifies_for_public_cert() {
        assert!(qualifies_for_public_cert("example.com"));
        assert!(qualifies_for_public_cert("*.example.com"));

        assert!(!qualifies_for_public_cert("localhost"));
        assert!(!qualifies_for_public_cert("printer.local"));
        assert!(!qualifies_for_public_cert("10.0.0.1"));
        assert!(!qualifies_for_public_cert("*.com"));
        assert!(!qualifies_for_public_cert("*.*.example.com"));
        assert!(!qualifies_for_public_cert("*"));
    }

    #[test]
    fn test_is_internal() {
        assert!(is_internal("localhost"));
        assert!(is_internal("app.localhost"));
        assert!(is_internal("NAS.Local"));
        assert!(is_internal("db.internal"));
        assert!(is_internal("router.home.arpa"));
        assert!(is_internal("box.local."));
        assert!(!is_internal("example.com"));
        assert!(!is_internal("localhost.example.com"));
    }

    #[test]
    fn test_is_ip() {
        assert!(is_ip("192.168.1.1"));
        assert!(is_ip("::1"));
        assert!(is_ip("[::1]"));
        assert!(!is_ip("example.com"));
        assert!(!is_ip("1.2.3"));
    }

    #[test]
    fn test_wants_internal_issuer() {
        assert!(wants_internal_issuer("internal.local", false));
        assert!(wants_internal_issuer("10.1.2.3", true));
        assert!(wants_internal_issuer("*.*.example.com", false));
        assert!(!wants_internal_issuer("*.*.example.com", true));
        assert!(!wants_internal_issuer("*.example.com", false));
        assert!(!wants_internal_issuer("pub.example", false));
    }

    #[test]
    fn test_match_wildcard() {
        assert!(match_wildcard("a.example.com", "a.example.com"));
        assert!(match_wildcard("A.Example.com", "a.example.COM"));
        assert!(match_wildcard("a.example.com", "*.example.com"));
        assert!(match_wildcard("a.b.example.com", "*.*.example.com"));
        assert!(match_wildcard("*.example.com", "*.*.com"));

        assert!(!match_wildcard("example.com", "*.example.com"));
        assert!(!match_wildcard("a.b.example.com", "*.example.com"));
        assert!(!match_wildcard("a.example.com", "b.example.com"));
        assert!(!match_wildcard("*.example.com", "a.example.com"));
    }
}

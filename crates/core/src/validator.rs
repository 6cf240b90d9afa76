//! Email address validation.
//!
//! Pure and total: malformed input is data, not an error. The accepted
//! grammar is RFC-5322-derived — a local part of permitted characters,
//! `@`, then dot-separated domain labels of alphanumerics with internal
//! hyphens. Single-label domains (`user@localhost`) are accepted.

/// Whole address must not exceed this many bytes.
const MAX_ADDRESS_LEN: usize = 254;
/// Local part (before `@`) must not exceed this many bytes.
const MAX_LOCAL_LEN: usize = 64;
/// Each domain label must not exceed this many bytes.
const MAX_LABEL_LEN: usize = 63;

/// Validate a candidate email address.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.len() > MAX_ADDRESS_LEN {
        return false;
    }

    let Some(at) = candidate.find('@') else {
        return false;
    };
    let local = &candidate[..at];
    let domain = &candidate[at + 1..];

    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }
    if !local.chars().all(is_local_char) {
        return false;
    }

    if domain.is_empty() {
        return false;
    }
    domain.split('.').all(is_valid_label)
}

/// Characters permitted in the local part: atext plus dot.
fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
}

/// A domain label: 1..=63 alphanumerics/hyphens, no leading/trailing hyphen.
fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user@sub.domain.com"));
        assert!(is_valid_email("first.last+tag@example.co.uk"));
        assert!(is_valid_email("A@X.com"));
        assert!(is_valid_email("o'brien@example.com"));
    }

    #[test]
    fn test_single_label_domain_is_accepted() {
        // Intentionally permissive: internal hostnames are legal targets.
        assert!(is_valid_email("user@domain"));
        assert!(is_valid_email("user@localhost"));
    }

    #[test]
    fn test_rejects_structural_garbage() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("bad-email"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@@x.com"));
        assert!(!is_valid_email("us er@x.com"));
    }

    #[test]
    fn test_rejects_bad_domain_labels() {
        assert!(!is_valid_email("user@x..com"));
        assert!(!is_valid_email("user@-x.com"));
        assert!(!is_valid_email("user@x-.com"));
        assert!(!is_valid_email("user@x.com."));
        assert!(is_valid_email("user@x-y.com"));
    }

    #[test]
    fn test_local_part_length_limit() {
        let local64 = "a".repeat(64);
        assert!(is_valid_email(&format!("{}@x.com", local64)));
        let local65 = "a".repeat(65);
        assert!(!is_valid_email(&format!("{}@x.com", local65)));
    }

    #[test]
    fn test_whole_address_length_limit() {
        // 254 bytes exactly: 64-char local + "@" + long domain.
        let local = "a".repeat(64);
        let label = "b".repeat(63);
        let mut address = format!("{}@{}.{}.{}", local, label, label, "c".repeat(61));
        assert_eq!(address.len(), 254);
        assert!(is_valid_email(&address));

        address.push('c');
        assert!(!is_valid_email(&address));
    }

    #[test]
    fn test_label_length_limit() {
        let label63 = "a".repeat(63);
        assert!(is_valid_email(&format!("u@{}.com", label63)));
        let label64 = "a".repeat(64);
        assert!(!is_valid_email(&format!("u@{}.com", label64)));
    }

    #[test]
    fn test_non_ascii_rejected() {
        assert!(!is_valid_email("usér@example.com"));
        assert!(!is_valid_email("user@exämple.com"));
    }
}

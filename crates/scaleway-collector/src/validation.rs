//! Validation of metric and label names.
//!
//! All checks are `const fn`s, so that descriptors declared as `static`s fail to compile
//! if they use a name Prometheus would reject.

/// Reason a name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// Name is empty.
    Empty,
    /// Name contains a non-ASCII char.
    NonAscii,
    /// Name starts with a digit.
    LeadingDigit,
    /// Name contains a char outside `[_a-z0-9]`.
    DisallowedChar,
}

impl NameError {
    const fn message(self) -> &'static str {
        match self {
            Self::Empty => "name cannot be empty",
            Self::NonAscii => "name contains non-ASCII chars",
            Self::LeadingDigit => "name starts with a digit",
            Self::DisallowedChar => "name contains disallowed char (allowed chars: [_a-z0-9])",
        }
    }
}

/// Checks that `name` is a valid snake-case metric or label name.
///
/// # Errors
///
/// Returns the first problem found in the name.
pub const fn check_name(name: &str) -> Result<(), NameError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(NameError::Empty);
    }

    let mut idx = 0;
    while idx < bytes.len() {
        let ch = bytes[idx];
        if !ch.is_ascii() {
            return Err(NameError::NonAscii);
        }
        if ch.is_ascii_digit() {
            if idx == 0 {
                return Err(NameError::LeadingDigit);
            }
        } else if ch != b'_' && !ch.is_ascii_lowercase() {
            return Err(NameError::DisallowedChar);
        }
        idx += 1;
    }
    Ok(())
}

const fn names_eq(lhs: &str, rhs: &str) -> bool {
    let (lhs, rhs) = (lhs.as_bytes(), rhs.as_bytes());
    if lhs.len() != rhs.len() {
        return false;
    }
    let mut idx = 0;
    while idx < lhs.len() {
        if lhs[idx] != rhs[idx] {
            return false;
        }
        idx += 1;
    }
    true
}

/// Checks that a metric name is valid.
#[track_caller]
pub const fn assert_metric_name(name: &str) {
    if let Err(err) = check_name(name) {
        panic!("{}", err.message());
    }
}

/// Checks that all label names in a schema are valid and pairwise distinct.
#[track_caller]
pub const fn assert_label_names(names: &[&str]) {
    let mut idx = 0;
    while idx < names.len() {
        if let Err(err) = check_name(names[idx]) {
            panic!("{}", err.message());
        }
        let mut other = idx + 1;
        while other < names.len() {
            if names_eq(names[idx], names[other]) {
                panic!("label schema contains a duplicate label name");
            }
            other += 1;
        }
        idx += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checking_names() {
        for name in ["up", "_private", "scaleway_database_up", "ipv4_bits"] {
            check_name(name).unwrap();
        }

        assert_eq!(check_name(""), Err(NameError::Empty));
        assert_eq!(check_name("été"), Err(NameError::NonAscii));
        assert_eq!(check_name("4xx"), Err(NameError::LeadingDigit));
        assert_eq!(check_name("storage-class"), Err(NameError::DisallowedChar));
        assert_eq!(check_name("Name"), Err(NameError::DisallowedChar));
    }

    #[test]
    fn accepting_label_schema() {
        assert_label_names(&["id", "name", "region"]);
        assert_label_names(&[]);
    }

    #[test]
    #[should_panic(expected = "duplicate label name")]
    fn rejecting_duplicate_labels() {
        assert_label_names(&["id", "name", "id"]);
    }
}

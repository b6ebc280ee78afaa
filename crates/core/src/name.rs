//! Naming rules shared by inventory items, menu items and customer names.

use crate::error::{DomainError, DomainResult};

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 63;

fn is_inner_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '&' | '(' | ')')
}

/// Validate a human-facing name.
///
/// A name is 3 to 63 ASCII characters, starts and ends with a letter or digit,
/// may contain spaces, `-`, `'`, `&` and parentheses in between, and never
/// contains a double space or `--`.
pub fn validate_name(field: &str, value: &str) -> DomainResult<()> {
    let len = value.len();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "{field} must be between {MIN_LEN} and {MAX_LEN} characters"
        )));
    }

    let chars: Vec<char> = value.chars().collect();
    let (first, last) = (chars[0], chars[chars.len() - 1]);
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(DomainError::validation(format!(
            "{field} must start and end with a letter or digit"
        )));
    }

    if let Some(bad) = chars.iter().find(|c| !is_inner_char(**c)) {
        return Err(DomainError::validation(format!(
            "{field} contains an invalid character {bad:?}"
        )));
    }

    if value.contains("  ") || value.contains("--") {
        return Err(DomainError::validation(format!(
            "{field} must not contain repeated spaces or dashes"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["Latte", "Mac & Cheese", "O'Brien", "Caramel Macchiato (Large)", "Oat-milk"] {
            assert!(validate_name("name", name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "ab", " Latte", "Latte ", "Lat  te", "Oat--milk", "Café", "Latte!", "-Latte"] {
            match validate_name("customer_name", name) {
                Err(DomainError::Validation(msg)) => assert!(msg.starts_with("customer_name")),
                other => panic!("Expected validation error for {name:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn enforces_max_length() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);
        assert!(validate_name("name", &ok).is_ok());
        assert!(validate_name("name", &too_long).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: alphanumeric words joined by single spaces are always valid.
        #[test]
        fn words_joined_by_single_spaces_are_valid(
            words in prop::collection::vec("[A-Za-z0-9]{3,8}", 1..5)
        ) {
            let name = words.join(" ");
            prop_assert!(validate_name("name", &name).is_ok());
        }
    }
}

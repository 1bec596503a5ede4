//! First-name validation

use types::errors::ValidationError;

/// Digits, ASCII letters, Latin-1 Supplement and Latin Extended-A
/// (U+00C0..=U+017F) and space.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || ('\u{00C0}'..='\u{017F}').contains(&c)
}

/// Trim and validate a first name, returning the value to store.
pub fn validate_first_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !trimmed.chars().all(is_name_char) {
        return Err(ValidationError::InvalidNameCharacters);
    }
    Ok(trimmed.to_string())
}

//! Profile rows
//!
//! One profile per user identity. Created on sign-up by the backend,
//! mutated only through the name-set operation.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A row of the `profiles` relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<UserId>, first_name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.map(str::to_string),
        }
    }

    /// Name shown in the standings table.
    ///
    /// Falls back to the short identity when no first name is on file or
    /// the stored name is empty.
    pub fn display_name(&self) -> String {
        match self.first_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.short(),
        }
    }

    /// Whether a non-empty first name is on file.
    pub fn has_first_name(&self) -> bool {
        self.first_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_first_name() {
        let p = Profile::new("abcdefgh", Some("Alice"));
        assert_eq!(p.display_name(), "Alice");
        assert!(p.has_first_name());
    }

    #[test]
    fn test_display_name_fallback() {
        let p = Profile::new("abcdefgh", None);
        assert_eq!(p.display_name(), "abcdef");

        let empty = Profile::new("abcdefgh", Some(""));
        assert_eq!(empty.display_name(), "abcdef");
        assert!(!empty.has_first_name());
    }

    #[test]
    fn test_profile_deserialize_missing_name() {
        let p: Profile = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
        assert_eq!(p.first_name, None);

        let p: Profile = serde_json::from_str(r#"{"id":"u1","first_name":null}"#).unwrap();
        assert_eq!(p.first_name, None);
    }
}

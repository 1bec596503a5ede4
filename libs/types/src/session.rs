//! Authentication session types
//!
//! The auth protocol is the backend's concern. The only fact the core
//! relies on is that a signed-in session carries a user identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// The authenticated user attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// An active auth session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user_id: UserId, email: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user: AuthUser { id: user_id, email },
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

/// Credentials for password sign-up and sign-in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &REDACTED)
            .field("user", &self.user)
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

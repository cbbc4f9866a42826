//! Verified participant identity handed over by the auth collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instrument assumed when the credential does not name one.
pub const DEFAULT_INSTRUMENT: &str = "vocals";

/// Authorization role of a participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Band leader; may drive the session.
    Admin,
    /// Observer only.
    #[default]
    Member,
}

impl Role {
    /// Map a free-form role claim onto a role. Only `admin` grants leader rights.
    pub fn from_claim(claim: &str) -> Self {
        if claim.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Member
        }
    }

    /// Whether this role may issue session actions.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is on the other end of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique user name.
    pub username: String,
    /// Authorization role.
    pub role: Role,
    /// Instrument the participant plays.
    pub instrument: String,
}

impl Identity {
    /// Build an identity.
    pub fn new(username: impl Into<String>, role: Role, instrument: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role,
            instrument: instrument.into(),
        }
    }

    /// Leader identity playing the default instrument.
    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin, DEFAULT_INSTRUMENT)
    }

    /// Observer identity.
    pub fn member(username: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self::new(username, Role::Member, instrument)
    }

    /// Shorthand for `self.role.is_admin()`.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_claim_is_admin() {
        assert_eq!(Role::from_claim("admin"), Role::Admin);
        assert_eq!(Role::from_claim(" ADMIN "), Role::Admin);
        assert_eq!(Role::from_claim("user"), Role::Member);
        assert_eq!(Role::from_claim(""), Role::Member);
        assert_eq!(Role::from_claim("administrator"), Role::Member);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }

    #[test]
    fn identity_constructors() {
        let leader = Identity::admin("dana");
        assert!(leader.is_admin());
        assert_eq!(leader.instrument, DEFAULT_INSTRUMENT);

        let drummer = Identity::member("lior", "drums");
        assert!(!drummer.is_admin());
        assert_eq!(drummer.instrument, "drums");
    }

    #[test]
    fn identity_json_shape() {
        let json = serde_json::to_value(Identity::member("a", "guitar")).unwrap();
        assert_eq!(json["username"], "a");
        assert_eq!(json["role"], "member");
        assert_eq!(json["instrument"], "guitar");
    }
}

//! Authorization rules for the user directory.
//!
//! Everything here is pure: no I/O, no clocks. The server consults it before touching the
//! store and the client form derives its layout from the same [`fields`] table.

pub mod fields;
pub mod validate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use fields::{EditContext, FieldRule, Screened};

/// Account role. Every user carries exactly one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(PolicyError::Invalid(
                "Invalid role. Must be 'user' or 'admin'".into(),
            )),
        }
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Everything a caller can ask of the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewSelf,
    ListAll,
    ViewOne(Uuid),
    /// Unauthenticated self-service account creation.
    Signup,
    /// Admin add-user.
    Create,
    UpdateSelf,
    UpdateOne(Uuid),
    DeleteSelf,
    DeleteOne(Uuid),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),
}

pub const ADMIN_ONLY: &str = "Only admin can perform this action";
pub const SELF_DELETE_VIA_ADMIN: &str = "Cannot delete your own account";
pub const SELF_UPDATE_VIA_ADMIN: &str =
    "Cannot update your own account here; use /users/me instead";

/// Decide whether `actor` may perform `action`.
///
/// On success returns the edit context governing which payload fields apply, if the action
/// carries a payload at all.
pub fn authorize(actor: Option<&Actor>, action: Action) -> Result<Option<EditContext>, PolicyError> {
    let Some(actor) = actor else {
        return match action {
            Action::Signup => Ok(Some(EditContext::Signup)),
            _ => Err(PolicyError::Forbidden("Authentication required".into())),
        };
    };

    match action {
        Action::ViewSelf | Action::DeleteSelf => Ok(None),
        Action::UpdateSelf => Ok(Some(EditContext::SelfEdit)),
        // Signing up again while holding a session is harmless; the new account is a plain user.
        Action::Signup => Ok(Some(EditContext::Signup)),
        Action::ListAll | Action::ViewOne(_) => {
            require_admin(actor)?;
            Ok(None)
        }
        Action::Create => {
            require_admin(actor)?;
            Ok(Some(EditContext::AdminCreate))
        }
        Action::UpdateOne(target) => {
            require_admin(actor)?;
            if target == actor.id {
                return Err(PolicyError::Forbidden(SELF_UPDATE_VIA_ADMIN.into()));
            }
            Ok(Some(EditContext::AdminEditOther))
        }
        Action::DeleteOne(target) => {
            require_admin(actor)?;
            if target == actor.id {
                return Err(PolicyError::Forbidden(SELF_DELETE_VIA_ADMIN.into()));
            }
            Ok(None)
        }
    }
}

fn require_admin(actor: &Actor) -> Result<(), PolicyError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(PolicyError::Forbidden(ADMIN_ONLY.into()))
    }
}

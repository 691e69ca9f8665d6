//! Field-level rules, one row per edit context.
//!
//! The server screens request payloads with [`screen`]; the client form reads the `form`
//! half of the same rows. Both sides therefore change together.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{validate, PolicyError, Role};

/// Which kind of write a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditContext {
    /// Anonymous self-service account creation.
    Signup,
    /// Admin adding a new account.
    AdminCreate,
    /// Anyone editing their own record, admins included.
    SelfEdit,
    /// Admin editing somebody else.
    AdminEditOther,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Password,
    Role,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Name, Field::Email, Field::Password, Field::Role];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::Role => "role",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the server does with a field in a given context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Required,
    Optional,
    /// Dropped from the payload without error.
    Ignored,
}

/// How the form presents a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Shown,
    /// Hidden until the user explicitly asks for it.
    OptIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField {
    pub presence: Presence,
    pub required: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    pub accepts: FieldRule,
    pub form: FormField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRules {
    pub name: FieldPolicy,
    pub email: FieldPolicy,
    pub password: FieldPolicy,
    pub role: FieldPolicy,
}

impl ContextRules {
    pub fn get(&self, field: Field) -> FieldPolicy {
        match field {
            Field::Name => self.name,
            Field::Email => self.email,
            Field::Password => self.password,
            Field::Role => self.role,
        }
    }
}

const fn policy(accepts: FieldRule, presence: Presence, required: bool, disabled: bool) -> FieldPolicy {
    FieldPolicy {
        accepts,
        form: FormField { presence, required, disabled },
    }
}

use FieldRule::{Ignored, Optional, Required};
use Presence::{OptIn, Shown};

static SIGNUP: ContextRules = ContextRules {
    name: policy(Required, Shown, true, false),
    email: policy(Required, Shown, true, false),
    password: policy(Required, Shown, true, false),
    role: policy(Ignored, Shown, false, true),
};

static ADMIN_CREATE: ContextRules = ContextRules {
    name: policy(Required, Shown, true, false),
    email: policy(Required, Shown, true, false),
    password: policy(Required, Shown, true, false),
    role: policy(Required, Shown, true, false),
};

// The form insists on a password for self-service edits; the server accepts edits without one.
static SELF_EDIT: ContextRules = ContextRules {
    name: policy(Optional, Shown, true, false),
    email: policy(Optional, Shown, true, false),
    password: policy(Optional, Shown, true, false),
    role: policy(Ignored, Shown, false, true),
};

static ADMIN_EDIT_OTHER: ContextRules = ContextRules {
    name: policy(Optional, Shown, true, false),
    email: policy(Optional, Shown, true, false),
    password: policy(Optional, OptIn, false, false),
    role: policy(Optional, Shown, true, false),
};

impl EditContext {
    pub const ALL: [EditContext; 4] = [
        EditContext::Signup,
        EditContext::AdminCreate,
        EditContext::SelfEdit,
        EditContext::AdminEditOther,
    ];

    pub fn rules(self) -> &'static ContextRules {
        match self {
            EditContext::Signup => &SIGNUP,
            EditContext::AdminCreate => &ADMIN_CREATE,
            EditContext::SelfEdit => &SELF_EDIT,
            EditContext::AdminEditOther => &ADMIN_EDIT_OTHER,
        }
    }

    /// Map the form's view of the world onto a context.
    ///
    /// A non-admin in edit mode always lands on `SelfEdit`; it is the only edit path open
    /// to them.
    pub fn resolve(is_edit_mode: bool, is_admin: bool, is_editing_self: bool) -> Self {
        match (is_edit_mode, is_admin, is_editing_self) {
            (false, true, _) => EditContext::AdminCreate,
            (false, false, _) => EditContext::Signup,
            (true, true, false) => EditContext::AdminEditOther,
            (true, _, _) => EditContext::SelfEdit,
        }
    }

    pub fn is_edit(self) -> bool {
        matches!(self, EditContext::SelfEdit | EditContext::AdminEditOther)
    }
}

/// Raw write payload as it travels over the wire.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserDraft {
    fn value(&self, field: Field) -> Option<&str> {
        let raw = match field {
            Field::Name => self.name.as_deref(),
            Field::Email => self.email.as_deref(),
            Field::Password => self.password.as_deref(),
            Field::Role => self.role.as_deref(),
        };
        // blank means "not supplied"; passwords are taken verbatim otherwise
        raw.filter(|v| !v.trim().is_empty())
    }
}

/// A payload reduced to the fields its context permits, each one validated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Screened {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    /// Fields that were supplied but dropped by the context.
    pub ignored: Vec<Field>,
}

fn redacted(password: &Option<String>) -> Option<&'static str> {
    password.as_ref().map(|_| "***")
}

impl fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDraft")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &redacted(&self.password))
            .field("role", &self.role)
            .finish()
    }
}

impl fmt::Debug for Screened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screened")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &redacted(&self.password))
            .field("role", &self.role)
            .field("ignored", &self.ignored)
            .finish()
    }
}

pub fn screen(ctx: EditContext, draft: &UserDraft) -> Result<Screened, PolicyError> {
    let rules = ctx.rules();
    let mut out = Screened::default();

    let missing: Vec<&str> = Field::ALL
        .iter()
        .filter(|f| rules.get(**f).accepts == Required && draft.value(**f).is_none())
        .map(|f| f.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(PolicyError::Invalid(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    for field in Field::ALL {
        let Some(value) = draft.value(field) else {
            continue;
        };
        if rules.get(field).accepts == Ignored {
            out.ignored.push(field);
            continue;
        }
        match field {
            Field::Role => out.role = Some(value.parse()?),
            Field::Name => out.name = Some(validate::name(value)?),
            Field::Email => out.email = Some(validate::email(value)?),
            Field::Password => {
                validate::password(value)?;
                out.password = Some(value.to_string());
            }
        }
    }

    Ok(out)
}

//! The add/edit user form, laid out from the same field table the server screens with.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::{
    policy::{
        fields::{FormField, Presence},
        validate, EditContext, Role,
    },
    users::dto::{PublicUser, UserPayload},
};

/// What the form knows about the situation it was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormContext {
    pub is_edit_mode: bool,
    pub is_admin: bool,
    pub is_editing_self: bool,
}

impl FormContext {
    pub fn edit_context(self) -> EditContext {
        EditContext::resolve(self.is_edit_mode, self.is_admin, self.is_editing_self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormLayout {
    pub context: EditContext,
    pub name: FormField,
    pub email: FormField,
    pub password: FormField,
    /// Follows `password`.
    pub confirm_password: FormField,
    pub role: FormField,
}

impl FormLayout {
    pub fn for_context(ctx: FormContext) -> Self {
        let context = ctx.edit_context();
        let rules = context.rules();
        Self {
            context,
            name: rules.name.form,
            email: rules.email.form,
            password: rules.password.form,
            confirm_password: rules.password.form,
            role: rules.role.form,
        }
    }

    pub fn password_opt_in(&self) -> bool {
        self.password.presence == Presence::OptIn
    }
}

/// Where a validated form goes. Paths are relative to the `/api` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Signup(UserPayload),
    Create(UserPayload),
    UpdateSelf(UserPayload),
    UpdateOther(Uuid, UserPayload),
}

impl Submission {
    pub fn method(&self) -> &'static str {
        match self {
            Submission::Signup(_) | Submission::Create(_) => "POST",
            Submission::UpdateSelf(_) | Submission::UpdateOther(..) => "PUT",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Submission::Signup(_) => "/auth/signup".into(),
            Submission::Create(_) => "/users".into(),
            Submission::UpdateSelf(_) => "/users/me".into(),
            Submission::UpdateOther(id, _) => format!("/users/{id}"),
        }
    }

    pub fn payload(&self) -> &UserPayload {
        match self {
            Submission::Signup(p)
            | Submission::Create(p)
            | Submission::UpdateSelf(p)
            | Submission::UpdateOther(_, p) => p,
        }
    }
}

/// Per-input messages, keyed by input name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn get(&self, input: &str) -> Option<&str> {
        self.0.get(input).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn add(&mut self, input: &'static str, message: impl Into<String>) {
        self.0.entry(input).or_insert_with(|| message.into());
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<&str> = self.0.values().map(String::as_str).collect();
        f.write_str(&msgs.join("; "))
    }
}

impl std::error::Error for FormErrors {}

#[derive(Clone)]
pub struct UserForm {
    pub context: FormContext,
    /// Record being edited, if any.
    pub target: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    /// Admin asked to set a new password for someone else.
    pub set_password: bool,
}

impl fmt::Debug for UserForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserForm")
            .field("context", &self.context)
            .field("target", &self.target)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("set_password", &self.set_password)
            .finish_non_exhaustive()
    }
}

impl UserForm {
    pub fn new(context: FormContext) -> Self {
        Self {
            context,
            target: None,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            role: Role::User,
            set_password: false,
        }
    }

    /// Prefilled from the record being edited. Passwords always start empty.
    pub fn editing(context: FormContext, user: &PublicUser) -> Self {
        Self {
            target: Some(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            ..Self::new(context)
        }
    }

    pub fn layout(&self) -> FormLayout {
        FormLayout::for_context(self.context)
    }

    /// Whether the password inputs are on screen.
    pub fn password_visible(&self) -> bool {
        let layout = self.layout();
        !layout.password_opt_in() || self.set_password
    }

    pub fn validate(&self) -> Result<(), FormErrors> {
        let layout = self.layout();
        let mut errors = FormErrors::default();

        check_text(&mut errors, "name", "Name is required", &self.name, layout.name, validate::name);
        check_text(&mut errors, "email", "Email is required", &self.email, layout.email, validate::email);

        if self.password_visible() && !layout.password.disabled {
            if self.password.is_empty() {
                if layout.password.required {
                    errors.add("password", "Password is required");
                }
            } else {
                if let Err(e) = validate::password(&self.password) {
                    errors.add("password", e.to_string());
                }
                if self.confirm_password.is_empty() {
                    errors.add("confirm_password", "Confirm your password");
                } else if self.confirm_password != self.password {
                    errors.add("confirm_password", "Passwords must match");
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and turn the values into a request. Disabled inputs and an empty password
    /// are left out of the payload.
    pub fn submission(&self) -> Result<Submission, FormErrors> {
        self.validate()?;
        let layout = self.layout();

        let password = (self.password_visible() && !self.password.is_empty())
            .then(|| self.password.clone());
        let role = (!layout.role.disabled).then(|| self.role.as_str().to_string());
        let payload = UserPayload {
            name: Some(self.name.trim().to_string()),
            email: Some(self.email.trim().to_string()),
            password,
            role,
        };

        Ok(match layout.context {
            EditContext::Signup => Submission::Signup(payload),
            EditContext::AdminCreate => Submission::Create(payload),
            EditContext::SelfEdit => Submission::UpdateSelf(payload),
            EditContext::AdminEditOther => match self.target {
                Some(id) => Submission::UpdateOther(id, payload),
                None => {
                    let mut errors = FormErrors::default();
                    errors.add("form", "No user selected");
                    return Err(errors);
                }
            },
        })
    }
}

fn check_text<T>(
    errors: &mut FormErrors,
    input: &'static str,
    missing: &str,
    value: &str,
    field: FormField,
    rule: impl Fn(&str) -> Result<T, crate::policy::PolicyError>,
) {
    if field.disabled {
        return;
    }
    if value.trim().is_empty() {
        if field.required {
            errors.add(input, missing);
        }
        return;
    }
    if let Err(e) = rule(value) {
        errors.add(input, e.to_string());
    }
}

//! User directory operations. Each one asks the policy first and only then reads or
//! writes the store.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    dto::UserPayload,
    repo::UserStore,
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    auth::password,
    config::BootstrapAdmin,
    error::{AppError, Result, EMAIL_IN_USE},
    policy::{
        authorize,
        fields::{screen, Field},
        validate, Action, Actor, EditContext, Role, Screened,
    },
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn log_ignored(ctx: EditContext, screened: &Screened) {
    if !screened.ignored.is_empty() {
        let fields: Vec<&str> = screened.ignored.iter().map(|f| f.as_str()).collect();
        debug!(?ctx, ?fields, "ignored fields not writable in this context");
    }
}

fn required(value: Option<String>, field: Field) -> Result<String> {
    value.ok_or_else(|| AppError::Invalid(format!("Missing required fields: {field}")))
}

async fn ensure_email_free(store: &dyn UserStore, email: &str, owner: Option<Uuid>) -> Result<()> {
    match store.find_by_email(email).await? {
        Some(existing) if Some(existing.id) != owner => {
            warn!(%email, "email already in use");
            Err(AppError::Conflict(EMAIL_IN_USE.into()))
        }
        _ => Ok(()),
    }
}

async fn insert_screened(store: &dyn UserStore, ctx: EditContext, payload: &UserPayload) -> Result<User> {
    let screened = screen(ctx, payload)?;
    log_ignored(ctx, &screened);

    let name = required(screened.name, Field::Name)?;
    let email = required(screened.email, Field::Email)?;
    let plain = required(screened.password, Field::Password)?;
    let role = screened.role.unwrap_or_default();

    ensure_email_free(store, &email, None).await?;
    let password_hash = password::hash(plain).await?;

    let user = store
        .insert(NewUser {
            name,
            email,
            password_hash,
            role,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, %role, ?ctx, "user created");
    Ok(user)
}

async fn apply_update(
    store: &dyn UserStore,
    ctx: EditContext,
    id: Uuid,
    payload: &UserPayload,
) -> Result<User> {
    let screened = screen(ctx, payload)?;
    log_ignored(ctx, &screened);

    let current = store
        .find_by_id(id)
        .await?
        .ok_or_else(AppError::user_not_found)?;

    let email = screened.email.filter(|e| *e != current.email);
    if let Some(email) = email.as_deref() {
        ensure_email_free(store, email, Some(id)).await?;
    }
    let password_hash = match screened.password {
        Some(plain) => Some(password::hash(plain).await?),
        None => None,
    };

    let changes = UserChanges {
        name: screened.name,
        email,
        password_hash,
        role: screened.role,
    };
    if changes.is_empty() {
        return Ok(current);
    }

    let user = store
        .update(id, changes)
        .await?
        .ok_or_else(AppError::user_not_found)?;
    info!(user_id = %user.id, role = %user.role, ?ctx, "user updated");
    Ok(user)
}

pub async fn get_self(store: &dyn UserStore, actor: &Actor) -> Result<User> {
    authorize(Some(actor), Action::ViewSelf)?;
    store
        .find_by_id(actor.id)
        .await?
        .ok_or_else(AppError::user_not_found)
}

pub async fn list_all(store: &dyn UserStore, actor: &Actor) -> Result<Vec<User>> {
    authorize(Some(actor), Action::ListAll)?;
    Ok(store.list().await?)
}

pub async fn get_by_id(store: &dyn UserStore, actor: &Actor, id: Uuid) -> Result<User> {
    authorize(Some(actor), Action::ViewOne(id))?;
    store.find_by_id(id).await?.ok_or_else(AppError::user_not_found)
}

/// Self-service account creation. The new account is always a plain user.
pub async fn signup(store: &dyn UserStore, payload: &UserPayload) -> Result<User> {
    let ctx = authorize(None, Action::Signup)?.unwrap_or(EditContext::Signup);
    insert_screened(store, ctx, payload).await
}

/// Admin add-user; the role is taken from the payload.
pub async fn create(store: &dyn UserStore, actor: &Actor, payload: &UserPayload) -> Result<User> {
    let ctx = authorize(Some(actor), Action::Create)?.unwrap_or(EditContext::AdminCreate);
    insert_screened(store, ctx, payload).await
}

/// Name, email and password only; a `role` in the payload is dropped.
pub async fn update_self(store: &dyn UserStore, actor: &Actor, payload: &UserPayload) -> Result<User> {
    let ctx = authorize(Some(actor), Action::UpdateSelf)?.unwrap_or(EditContext::SelfEdit);
    apply_update(store, ctx, actor.id, payload).await
}

/// Admin edit of another account, role included.
pub async fn update_one(
    store: &dyn UserStore,
    actor: &Actor,
    target: Uuid,
    payload: &UserPayload,
) -> Result<User> {
    let ctx =
        authorize(Some(actor), Action::UpdateOne(target))?.unwrap_or(EditContext::AdminEditOther);
    apply_update(store, ctx, target, payload).await
}

pub async fn delete_self(store: &dyn UserStore, actor: &Actor) -> Result<User> {
    authorize(Some(actor), Action::DeleteSelf)?;
    let user = store
        .delete(actor.id)
        .await?
        .ok_or_else(AppError::user_not_found)?;
    info!(user_id = %user.id, "account deleted by owner");
    Ok(user)
}

pub async fn delete_one(store: &dyn UserStore, actor: &Actor, target: Uuid) -> Result<User> {
    authorize(Some(actor), Action::DeleteOne(target))?;
    let user = store
        .delete(target)
        .await?
        .ok_or_else(AppError::user_not_found)?;
    info!(user_id = %user.id, by = %actor.id, "account deleted by admin");
    Ok(user)
}

/// Check a login attempt against the stored hash.
pub async fn authenticate(store: &dyn UserStore, email: &str, plain: &str) -> Result<User> {
    let email = validate::normalize_email(email);
    if email.is_empty() || plain.is_empty() {
        warn!("login with blank credentials");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let Some(user) = store.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !password::verify(plain.to_string(), user.password_hash.clone()).await? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }
    Ok(user)
}

/// Seed the configured admin account if nobody owns that email yet.
pub async fn ensure_bootstrap_admin(store: &dyn UserStore, admin: &BootstrapAdmin) -> Result<()> {
    if let Some(existing) = store.find_by_email(&validate::normalize_email(&admin.email)).await? {
        if existing.role != Role::Admin {
            warn!(email = %existing.email, "bootstrap admin email belongs to a non-admin account");
        }
        return Ok(());
    }

    let payload = UserPayload {
        name: Some(admin.name.clone()),
        email: Some(admin.email.clone()),
        password: Some(admin.password.clone()),
        role: Some(Role::Admin.to_string()),
    };
    let user = insert_screened(store, EditContext::AdminCreate, &payload).await?;
    info!(user_id = %user.id, email = %user.email, "bootstrap admin created");
    Ok(())
}

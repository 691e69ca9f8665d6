use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{DeleteResponse, PublicUser, UserEnvelope, UserList, UserMutation, UserPayload},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::Result,
    extract::{ApiJson, ApiPath},
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).put(update_me).delete(delete_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<UserEnvelope>> {
    let user = services::get_self(state.users.as_ref(), &actor).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(payload): ApiJson<UserPayload>,
) -> Result<Json<UserMutation>> {
    let user = services::update_self(state.users.as_ref(), &actor, &payload).await?;
    Ok(Json(UserMutation {
        message: "Profile updated successfully".into(),
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<DeleteResponse>> {
    let user = services::delete_self(state.users.as_ref(), &actor).await?;
    Ok(Json(DeleteResponse {
        message: "Account deleted successfully".into(),
        deleted_user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<UserList>> {
    let users: Vec<PublicUser> = services::list_all(state.users.as_ref(), &actor)
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();
    Ok(Json(UserList {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserEnvelope>> {
    let user = services::get_by_id(state.users.as_ref(), &actor, id).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(payload): ApiJson<UserPayload>,
) -> Result<(StatusCode, Json<UserMutation>)> {
    let user = services::create(state.users.as_ref(), &actor, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserMutation {
            message: "User created successfully".into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserPayload>,
) -> Result<Json<UserMutation>> {
    let user = services::update_one(state.users.as_ref(), &actor, id, &payload).await?;
    Ok(Json(UserMutation {
        message: "User updated successfully".into(),
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let user = services::delete_one(state.users.as_ref(), &actor, id).await?;
    Ok(Json(DeleteResponse {
        message: "User deleted successfully".into(),
        deleted_user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::FromRef,
        http::{Method, StatusCode},
    };
    use serde_json::json;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use crate::{
        app::testing::{app_with_admin, call, login},
        auth::jwt::JwtKeys,
        policy::Role,
    };

    const ADMIN: (&str, &str) = ("admin@x.com", "Adm1n!pw");

    #[tokio::test]
    async fn admin_creates_lists_and_fetches_users() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let (token, _) = login(&app, ADMIN.0, ADMIN.1).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({ "name": "Bob", "email": "bob@x.com", "password": "Abc123!", "role": "user" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["user"]["role"], "user");
        assert!(!body.to_string().contains("password"));
        let bob_id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, list) = call(&app, Method::GET, "/api/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 2);
        assert_eq!(list["users"][0]["email"], "bob@x.com");

        let (status, one) = call(&app, Method::GET, &format!("/api/users/{bob_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(one["user"]["name"], "Bob");
    }

    #[tokio::test]
    async fn admin_create_requires_role() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let (token, _) = login(&app, ADMIN.0, ADMIN.1).await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({ "name": "Bob", "email": "bob@x.com", "password": "Abc123!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields: role");
    }

    #[tokio::test]
    async fn admin_cannot_delete_self_through_id_route() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let (token, me) = login(&app, ADMIN.0, ADMIN.1).await;
        let id = me["id"].as_str().unwrap();

        let (status, body) = call(&app, Method::DELETE, &format!("/api/users/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Cannot delete your own account");

        let (status, _) = call(&app, Method::GET, "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_edits_and_deletes_another_user() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let (token, _) = login(&app, ADMIN.0, ADMIN.1).await;
        let (_, created) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({ "name": "Bob", "email": "bob@x.com", "password": "Abc123!", "role": "user" })),
        )
        .await;
        let id = created["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/users/{id}"),
            Some(&token),
            Some(json!({ "role": "admin", "password": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
        login(&app, "bob@x.com", "Abc123!").await;

        let (status, body) = call(&app, Method::DELETE, &format!("/api/users/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedUser"]["email"], "bob@x.com");

        let (status, _) = call(&app, Method::GET, &format!("/api/users/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_cannot_promote_self_or_reach_admin_routes() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Bob", "email": "bob@x.com", "password": "Abc123!" })),
        )
        .await;
        let (token, _) = login(&app, "bob@x.com", "Abc123!").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/users/me",
            Some(&token),
            Some(json!({ "name": "Robert", "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Profile updated successfully");
        assert_eq!(body["user"]["name"], "Robert");
        assert_eq!(body["user"]["role"], "user");

        let (status, body) = call(&app, Method::GET, "/api/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].is_string());

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({ "name": "Eve", "email": "eve@x.com", "password": "Abc123!", "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn user_deletes_own_account() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        call(
            &app,
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Bob", "email": "bob@x.com", "password": "Abc123!" })),
        )
        .await;
        let (token, _) = login(&app, "bob@x.com", "Abc123!").await;

        let (status, body) = call(&app, Method::DELETE, "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Account deleted successfully");

        let (status, _) = call(&app, Method::GET, "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_id_is_a_bad_request() {
        let (app, _) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let (token, _) = login(&app, ADMIN.0, ADMIN.1).await;
        let (status, body) = call(&app, Method::GET, "/api/users/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid user ID");
    }

    #[tokio::test]
    async fn bad_tokens_are_unauthorized() {
        let (app, state) = app_with_admin(ADMIN.0, ADMIN.1).await;
        let keys = JwtKeys::from_ref(&state);
        let expired = keys
            .issue_at(Uuid::new_v4(), Role::Admin, OffsetDateTime::now_utc() - Duration::hours(1))
            .unwrap();

        let (status, body) = call(&app, Method::GET, "/api/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "No token");

        let (status, body) = call(&app, Method::GET, "/api/users/me", Some(&expired), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token expired. Please login again.");

        let (token, _) = login(&app, ADMIN.0, ADMIN.1).await;
        let tampered = format!("{token}x");
        let (status, _) = call(&app, Method::GET, "/api/users", Some(&tampered), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

//! Typed HTTP client for the REST surface.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{form::Submission, session::SessionHandle};
use crate::{
    auth::dto::{AuthResponse, LoginRequest},
    users::dto::{DeleteResponse, PublicUser, UserEnvelope, UserList, UserMutation, UserPayload},
};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error envelope; `message` is shown to the user as is.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionHandle,
}

impl ApiClient {
    /// `base_url` includes the `/api` prefix, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_session(base_url, SessionHandle::new())
    }

    pub fn with_session(base_url: impl Into<String>, session: SessionHandle) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn signup(&self, payload: &UserPayload) -> Result<PublicUser, ClientError> {
        let res: AuthResponse = self.send(Method::POST, "/auth/signup", Some(payload)).await?;
        self.session.login(res.token, res.user.clone());
        Ok(res.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let res: AuthResponse = self.send(Method::POST, "/auth/login", Some(&body)).await?;
        self.session.login(res.token, res.user.clone());
        Ok(res.user)
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn me(&self) -> Result<PublicUser, ClientError> {
        let res: UserEnvelope = self.send(Method::GET, "/users/me", None::<&()>).await?;
        self.session.refresh_user(res.user.clone());
        Ok(res.user)
    }

    pub async fn update_me(&self, payload: &UserPayload) -> Result<UserMutation, ClientError> {
        let res: UserMutation = self.send(Method::PUT, "/users/me", Some(payload)).await?;
        self.session.refresh_user(res.user.clone());
        Ok(res)
    }

    /// Deletes the signed-in account and ends the session.
    pub async fn delete_me(&self) -> Result<DeleteResponse, ClientError> {
        let res = self.send(Method::DELETE, "/users/me", None::<&()>).await?;
        self.session.logout();
        Ok(res)
    }

    pub async fn list_users(&self) -> Result<UserList, ClientError> {
        self.send(Method::GET, "/users", None::<&()>).await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<PublicUser, ClientError> {
        let res: UserEnvelope = self
            .send(Method::GET, &format!("/users/{id}"), None::<&()>)
            .await?;
        Ok(res.user)
    }

    pub async fn create_user(&self, payload: &UserPayload) -> Result<UserMutation, ClientError> {
        self.send(Method::POST, "/users", Some(payload)).await
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        payload: &UserPayload,
    ) -> Result<UserMutation, ClientError> {
        self.send(Method::PUT, &format!("/users/{id}"), Some(payload))
            .await
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<DeleteResponse, ClientError> {
        self.send(Method::DELETE, &format!("/users/{id}"), None::<&()>)
            .await
    }

    /// Send whatever the user form produced to the endpoint it targets.
    pub async fn submit(&self, submission: &Submission) -> Result<PublicUser, ClientError> {
        match submission {
            Submission::Signup(p) => self.signup(p).await,
            Submission::Create(p) => Ok(self.create_user(p).await?.user),
            Submission::UpdateSelf(p) => Ok(self.update_me(p).await?.user),
            Submission::UpdateOther(id, p) => Ok(self.update_user(*id, p).await?.user),
        }
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "api request");

        let mut req: RequestBuilder = self.http.request(method, &url);
        // credentials endpoints never carry the current session
        let token = self.session.token().filter(|_| !path.starts_with("/auth/"));
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        self.read(res, token.is_some()).await
    }

    async fn read<T: DeserializeOwned>(&self, res: Response, authed: bool) -> Result<T, ClientError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }

        let message = match res.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        if status == StatusCode::UNAUTHORIZED && authed {
            self.session.expire();
        }
        warn!(status = status.as_u16(), %message, "api request rejected");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

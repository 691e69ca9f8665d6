use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credentials for the admin account seeded at startup.
#[derive(Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl BootstrapAdmin {
    /// Both email and password must be present; a lone one is reported and ignored.
    pub fn from_parts(
        email: Option<String>,
        password: Option<String>,
        name: Option<String>,
    ) -> Option<Self> {
        let email = email.filter(|v| !v.trim().is_empty());
        let password = password.filter(|v| !v.is_empty());
        match (email, password) {
            (Some(email), Some(password)) => Some(Self {
                name: name
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| "Administrator".into()),
                email,
                password,
            }),
            (None, None) => None,
            (email, _) => {
                warn!(
                    email_set = email.is_some(),
                    "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must both be set; skipping bootstrap admin"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "usermanager".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "usermanager-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60),
        };
        let bootstrap_admin = BootstrapAdmin::from_parts(
            std::env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
            std::env::var("BOOTSTRAP_ADMIN_NAME").ok(),
        );
        Ok(Self {
            database_url,
            db_max_connections,
            jwt,
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn bootstrap_admin_needs_email_and_password() {
        let admin = BootstrapAdmin::from_parts(some("root@x.com"), some("Adm1n!pw"), None).unwrap();
        assert_eq!(admin.name, "Administrator");
        assert_eq!(admin.email, "root@x.com");

        assert!(BootstrapAdmin::from_parts(some("root@x.com"), None, some("Root")).is_none());
        assert!(BootstrapAdmin::from_parts(None, some("Adm1n!pw"), None).is_none());
        assert!(BootstrapAdmin::from_parts(some("  "), some("Adm1n!pw"), None).is_none());
        assert!(BootstrapAdmin::from_parts(None, None, None).is_none());
    }

    #[test]
    fn bootstrap_admin_debug_hides_password() {
        let admin = BootstrapAdmin::from_parts(some("root@x.com"), some("Adm1n!pw"), some("Root")).unwrap();
        let shown = format!("{admin:?}");
        assert!(shown.contains("root@x.com"));
        assert!(!shown.contains("Adm1n!pw"));
    }
}

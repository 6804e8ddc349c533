use gutenshelf_common::utils::password;
use gutenshelf_common::{NewUser, Role, User};
use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::App;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// One `@` with something on both sides and a dot somewhere in the domain.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

impl App {
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email);
        if !looks_like_email(&email) {
            return Err(ServiceError::Validation("A valid email is required".into()));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = password::hash(&registration.password).map_err(|e| {
            tracing::error!("Failed to hash password: {:?}", e);
            ServiceError::Internal("Password could not be processed".into())
        })?;

        let display_name = registration
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let user = self
            .storage
            .create_user(&NewUser {
                email,
                password_hash,
                display_name,
            })
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict("Email already registered".into()),
                other => other,
            })?;
        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn login(&self, credentials: Credentials) -> Result<User> {
        let email = normalize_email(&credentials.email);
        let user = self
            .storage
            .get_user_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;
        if !password::verify(&credentials.password, &user.password_hash) {
            return Err(ServiceError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn promote(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        if !self.storage.set_role(&email, Role::Admin).await? {
            return Err(ServiceError::NotFound(format!("No user with email {email}")));
        }
        tracing::info!("Promoted {} to admin", email);
        Ok(())
    }
}

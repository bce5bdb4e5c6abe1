//! Authentication
//!
//! The chat core only asks [`AuthClient::current_user`] whether someone is
//! signed in. [`HttpAuthClient`] implements that on top of the backend's
//! login and registration endpoints.

use crate::{
    config::ChatConfig,
    transport::{error_text, network_error, read_body},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Username the backend knows the user by
    pub username: String,
}

/// Source of the signed-in identity
pub trait AuthClient: Send + Sync {
    /// The signed-in user, if any
    fn current_user(&self) -> Option<Identity>;
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    user: Option<Identity>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// Auth client talking to the backend's `/login` and `/register` endpoints
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: reqwest::Client,
    login_url: String,
    register_url: String,
    identity: Arc<RwLock<Option<Identity>>>,
}

impl HttpAuthClient {
    /// Create an auth client for the backend described by `config`
    pub fn new(config: &ChatConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            login_url: config.endpoint(&config.login_path),
            register_url: config.endpoint(&config.register_path),
            identity: Arc::new(RwLock::new(None)),
        })
    }

    /// Sign in and remember the identity on success
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation("username and password are required".to_string()));
        }

        info!("Logging in as {}", username);
        let body = self.post(&self.login_url, username, password).await?;

        let parsed: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("Malformed login response: {}", e)))?;

        if parsed.status.as_deref().is_some_and(|s| s != "success") {
            return Err(Error::Auth(
                error_text(&body).unwrap_or_else(|| "login rejected".to_string()),
            ));
        }

        let identity = parsed.user.unwrap_or_else(|| Identity {
            username: username.to_string(),
        });
        self.set_identity(Some(identity.clone()));

        info!("Logged in as {}", identity.username);
        Ok(identity)
    }

    /// Create an account; returns the backend's user id when it sends one
    pub async fn register(&self, username: &str, password: &str) -> Result<Option<String>> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation("username and password are required".to_string()));
        }

        info!("Registering {}", username);
        let body = self.post(&self.register_url, username, password).await?;

        let parsed: RegisterResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("Malformed register response: {}", e)))?;

        if parsed.status.as_deref().is_some_and(|s| s != "success") {
            return Err(Error::Auth(
                error_text(&body).unwrap_or_else(|| "registration rejected".to_string()),
            ));
        }

        Ok(parsed.user_id)
    }

    /// Forget the signed-in identity
    pub fn logout(&self) {
        self.set_identity(None);
    }

    async fn post(&self, url: &str, username: &str, password: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .json(&Credentials { username, password })
            .send()
            .await
            .map_err(|e| network_error("Auth request", url, e))?;

        let status = response.status();
        let body = read_body(response, url).await?;

        if !status.is_success() {
            warn!("Auth request to {} failed with status {}", url, status);
            return Err(Error::Auth(error_text(&body).unwrap_or_else(|| {
                format!("request failed with status {}", status.as_u16())
            })));
        }

        Ok(body)
    }

    fn set_identity(&self, identity: Option<Identity>) {
        match self.identity.write() {
            Ok(mut guard) => *guard = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }
}

impl AuthClient for HttpAuthClient {
    fn current_user(&self) -> Option<Identity> {
        match self.identity.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

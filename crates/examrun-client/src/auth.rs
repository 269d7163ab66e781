//! Authenticators: backend email login and an offline stand-in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use examrun_core::result::Identity;
use examrun_core::traits::{Authenticator, LoginOutcome};

use crate::api::{build_client, endpoint, error_message, parse_base_url};
use crate::error::LoginError;

/// Login attempts per interactive flow before it counts as cancelled.
const MAX_LOGIN_ATTEMPTS: u32 = 3;

/// Platform tag the backend records for this client.
const PLATFORM: &str = "WEB";

/// Where the interactive login gets its credentials.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Ask for an email address. `None` means the user backed out.
    async fn ask_email(&self) -> Option<String>;

    /// Show why the last attempt failed before asking again.
    fn report_failure(&self, message: &str);
}

/// Logs in against `POST /users` and keeps the resulting identity in memory.
pub struct ApiAuthenticator {
    base_url: Url,
    timeout_secs: u64,
    device_id: String,
    client: reqwest::Client,
    prompt: Arc<dyn CredentialPrompt>,
    identity: Mutex<Option<Identity>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    device_id: &'a str,
    platform: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Deserialize)]
struct LoginUser {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl ApiAuthenticator {
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        device_id: &str,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout_secs,
            device_id: device_id.to_string(),
            client: build_client(timeout_secs)?,
            prompt,
            identity: Mutex::new(None),
        })
    }

    /// Start out signed in, e.g. with a token from the config file.
    pub fn with_identity(self, identity: Identity) -> Self {
        *self.slot() = Some(identity);
        self
    }

    fn slot(&self) -> MutexGuard<'_, Option<Identity>> {
        self.identity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exchange an email address for a user id and bearer token.
    #[instrument(skip(self))]
    pub async fn login(&self, email: &str) -> Result<Identity, LoginError> {
        let url = endpoint(&self.base_url, &["users"])
            .map_err(|e| LoginError::Network(e.to_string()))?;
        let body = LoginRequest {
            email,
            device_id: &self.device_id,
            platform: PLATFORM,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LoginError::Timeout(self.timeout_secs)
                } else {
                    LoginError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoginError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Decode(e.to_string()))?;
        Ok(Identity {
            user_id: login.user.id,
            email: login.user.email.or_else(|| Some(email.to_string())),
            token: login.token,
        })
    }
}

#[async_trait]
impl Authenticator for ApiAuthenticator {
    fn current_identity(&self) -> Option<Identity> {
        self.slot().clone()
    }

    async fn request_interactive_login(&self) -> LoginOutcome {
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            let Some(email) = self.prompt.ask_email().await else {
                info!("login cancelled");
                return LoginOutcome::Cancelled;
            };
            let email = email.trim();
            if email.is_empty() {
                self.prompt.report_failure("an email address is required");
                continue;
            }

            match self.login(email).await {
                Ok(identity) => {
                    info!(user_id = %identity.user_id, "logged in");
                    *self.slot() = Some(identity.clone());
                    return LoginOutcome::Authenticated(identity);
                }
                Err(e) => {
                    warn!("login failed: {e}");
                    self.prompt.report_failure(&e.to_string());
                }
            }
        }
        warn!("giving up after {MAX_LOGIN_ATTEMPTS} login attempts");
        LoginOutcome::Cancelled
    }

    fn invalidate(&self) {
        if self.slot().take().is_some() {
            info!("identity discarded");
        }
    }
}

/// Authenticator for runs that never save: there is no identity and every
/// login is cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAuthenticator;

#[async_trait]
impl Authenticator for OfflineAuthenticator {
    fn current_identity(&self) -> Option<Identity> {
        None
    }

    async fn request_interactive_login(&self) -> LoginOutcome {
        LoginOutcome::Cancelled
    }

    fn invalidate(&self) {}
}

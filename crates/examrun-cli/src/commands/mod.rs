pub mod delete;
pub mod history;
pub mod init;
pub mod list;
pub mod review;
pub mod take;
pub mod validate;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use examrun_client::{
    ApiAuthenticator, CredentialPrompt, ExamrunConfig, HttpSessionStore, JsonCatalog,
};
use examrun_core::error::StoreError;
use examrun_core::result::Identity;
use examrun_core::traits::{Authenticator, LoginOutcome};

/// Load the exam catalogue from `--exams`, or the configured data file.
pub(crate) fn load_catalog(exams: Option<PathBuf>, config: &ExamrunConfig) -> Result<JsonCatalog> {
    let path = exams.unwrap_or_else(|| config.exams_path.clone());
    JsonCatalog::load(&path).with_context(|| format!("failed to load exams from {}", path.display()))
}

pub(crate) fn session_store(config: &ExamrunConfig) -> Result<HttpSessionStore> {
    HttpSessionStore::new(&config.api.base_url, config.api.timeout_secs)
}

/// Backend authenticator, signed in already when the config carries a token.
pub(crate) fn api_authenticator(
    config: &ExamrunConfig,
    prompt: Arc<dyn CredentialPrompt>,
) -> Result<ApiAuthenticator> {
    let auth = ApiAuthenticator::new(
        &config.api.base_url,
        config.api.timeout_secs,
        &config.device_id,
        prompt,
    )?;
    Ok(match config.configured_identity() {
        Some(identity) => auth.with_identity(identity),
        None => auth,
    })
}

/// Run `op` with an identity, logging in first if there is none. A
/// rejected identity is discarded and the login asked for once more.
pub(crate) async fn with_login<T, F, Fut>(auth: &dyn Authenticator, mut op: F) -> Result<T>
where
    F: FnMut(Identity) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    for _ in 0..2 {
        let identity = match auth.current_identity() {
            Some(identity) => identity,
            None => match auth.request_interactive_login().await {
                LoginOutcome::Authenticated(identity) => identity,
                LoginOutcome::Cancelled => bail!("login required"),
            },
        };
        match op(identity).await {
            Err(e) if e.is_auth() => {
                warn!("stored identity rejected: {e}");
                eprintln!("Your login is invalid or has expired.");
                auth.invalidate();
            }
            other => return other.map_err(Into::into),
        }
    }
    bail!("login required")
}

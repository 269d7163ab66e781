//! The `examrun delete` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use examrun_client::load_config_from;
use examrun_core::traits::SessionStore;

use super::{api_authenticator, session_store, with_login};
use crate::prompt::StdinPrompt;

pub async fn execute(session_id: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = session_store(&config)?;
    let auth = api_authenticator(&config, Arc::new(StdinPrompt::new()))?;

    with_login(&auth, |identity| {
        let (store, session_id) = (&store, session_id.as_str());
        async move { store.delete(session_id, &identity).await }
    })
    .await?;

    println!("Deleted attempt {session_id}.");
    Ok(())
}

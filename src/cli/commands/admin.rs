//! Create admin command handler

use std::sync::Arc;

use crate::config::Config;
use crate::services::LogMailer;
use crate::state::SharedState;

pub async fn cmd_create_admin(
    config: Config,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let (state, worker) = SharedState::with_mailer(config, Arc::new(LogMailer)).await?;

    let created = state
        .auth_service
        .ensure_admin(email, password, name)
        .await?;

    if created {
        println!("✓ Admin account created for {email}");
    } else {
        println!("An account with email {email} already exists, nothing to do.");
    }

    let store = state.store.clone();
    drop(state);
    store.close().await?;
    let _ = worker.await;
    Ok(())
}

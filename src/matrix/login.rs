//! Login of the bridge bot account.
//!
//! The first run logs in with the configured password and persists the
//! resulting session. Later runs restore that session and never send the
//! password again.

use log::{debug, info};
use matrix_sdk::Client;

use crate::{config, matrix::session::MatrixSession};

async fn create_session(
    credentials: &config::Matrix,
    matrix_session: &MatrixSession,
) -> anyhow::Result<Client> {
    let client = Client::builder()
        .sqlite_store(
            matrix_session.sqlite_path(),
            credentials.passphrase.as_deref(),
        )
        .server_name(credentials.user_id.server_name())
        .build()
        .await?;

    debug!("matrix client created");

    client
        .matrix_auth()
        .login_username(&credentials.user_id, &credentials.password)
        .initial_device_display_name("ferry bridge")
        .send()
        .await?;

    let Some(user_session) = client.matrix_auth().session() else {
        anyhow::bail!("no session after logging in as {}", credentials.user_id);
    };
    matrix_session.persist_user_session(&user_session).await?;

    info!("logged in as {}", credentials.user_id);
    Ok(client)
}

async fn restore_session(
    credentials: &config::Matrix,
    matrix_session: &MatrixSession,
    user_session: &matrix_sdk::authentication::matrix::MatrixSession,
) -> anyhow::Result<Client> {
    info!("restoring matrix session from disk");

    let client = Client::builder()
        .server_name(credentials.user_id.server_name())
        .sqlite_store(
            matrix_session.sqlite_path(),
            credentials.passphrase.as_deref(),
        )
        .build()
        .await?;

    client.restore_session(user_session.clone()).await?;

    info!("matrix session of {} restored", user_session.meta.user_id);
    Ok(client)
}

/// Returns a client logged in as the bridge bot.
///
/// # Errors
///
/// Returns an error if the homeserver cannot be reached, the credentials are
/// rejected, or the session cannot be persisted.
pub async fn setup_client(
    credentials: &config::Matrix,
    matrix_session: &MatrixSession,
) -> anyhow::Result<Client> {
    info!("setting up matrix client for {}", credentials.user_id);

    match matrix_session.user_session() {
        Some(user_session) => restore_session(credentials, matrix_session, user_session).await,
        None => create_session(credentials, matrix_session).await,
    }
}

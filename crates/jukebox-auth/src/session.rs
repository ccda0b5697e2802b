use tracing::{info, warn};

use jukebox_types::models::Identity;

use crate::client::AuthClient;
use crate::error::AuthError;

/// Decides at startup whether the client is signed in, without asking the
/// user for anything.
#[derive(Clone)]
pub struct Session {
    client: AuthClient,
    purge_on_failure: bool,
}

impl Session {
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            purge_on_failure: true,
        }
    }

    /// Whether a failed bootstrap wipes leftover identity keys and tokens.
    pub fn purge_on_failure(mut self, purge: bool) -> Self {
        self.purge_on_failure = purge;
        self
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    /// A complete stored identity wins outright. Otherwise try the access
    /// token, then the refresh token, and stop at the first that works. The
    /// error is the one from the last attempt.
    pub async fn restore(&self) -> Result<Identity, AuthError> {
        let store = self.client.store();
        if let Some(identity) = store.identity()? {
            return Ok(identity);
        }
        // never leave a user_id that cannot count as signed in
        if store.discard_malformed_user_id()? {
            warn!("Discarded malformed stored user id");
        }

        let err = match self.client.login_from_access_token().await {
            Ok(identity) => return Ok(identity),
            Err(e) => e,
        };
        warn!("Access token login failed: {}", err);

        let err = match self.client.login_from_refresh_token().await {
            Ok(identity) => return Ok(identity),
            Err(e) => e,
        };
        warn!("Refresh token login failed: {}", err);

        if self.purge_on_failure {
            store.clear_identity()?;
        }
        Err(err)
    }

    /// `true` iff the client ends up with a complete identity.
    pub async fn auto_login(&self) -> bool {
        match self.restore().await {
            Ok(identity) => {
                info!("Session restored for {} ({})", identity.username, identity.user_id);
                true
            }
            Err(e) => {
                info!("No session to restore: {}", e);
                false
            }
        }
    }

    /// Log out server-side, then forget the local identity.
    pub async fn full_logout(&self) -> bool {
        match self.client.logout().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Logout failed: {}", e);
                false
            }
        }
    }
}

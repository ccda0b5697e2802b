use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::debug;

use jukebox_types::models::{Identity, TokenKind, USERNAME_KEY, USER_ID_KEY};

use crate::Store;
use crate::queries::{delete_item, query_item, upsert_item};

/// Fired whenever the stored identity is written or cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    Set(Identity),
    Cleared,
}

impl Store {
    /// Subscribe to identity writes.
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityChange> {
        self.changes.subscribe()
    }

    /// Write both identity keys at once.
    pub fn set_identity(&self, user_id: i64, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            upsert_item(&tx, USERNAME_KEY, username)?;
            upsert_item(&tx, USER_ID_KEY, &user_id.to_string())?;
            tx.commit()?;
            Ok(())
        })?;

        debug!(user_id, username, "identity stored");
        let _ = self.changes.send(IdentityChange::Set(Identity {
            user_id,
            username: username.to_string(),
        }));
        Ok(())
    }

    /// Remove the identity keys and both tokens.
    pub fn clear_identity(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            delete_item(&tx, USERNAME_KEY)?;
            delete_item(&tx, USER_ID_KEY)?;
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                tx.execute("DELETE FROM cookies WHERE name = ?1", [kind.cookie_name()])?;
            }
            tx.commit()?;
            Ok(())
        })?;

        debug!("identity cleared");
        let _ = self.changes.send(IdentityChange::Cleared);
        Ok(())
    }

    pub fn username(&self) -> Result<Option<String>> {
        self.with_conn(|conn| query_item(conn, USERNAME_KEY))
    }

    pub fn user_id(&self) -> Result<Option<i64>> {
        let raw = self.with_conn(|conn| query_item(conn, USER_ID_KEY))?;
        raw.map(|id| id.parse::<i64>().with_context(|| format!("stored user id {id:?} is not an integer")))
            .transpose()
    }

    /// Both keys present and well-formed, read under one lock.
    pub fn identity(&self) -> Result<Option<Identity>> {
        let (user_id, username) = self.with_conn(|conn| {
            Ok((query_item(conn, USER_ID_KEY)?, query_item(conn, USERNAME_KEY)?))
        })?;

        match (user_id, username) {
            (Some(user_id), Some(username)) => Ok(user_id
                .parse::<i64>()
                .ok()
                .map(|user_id| Identity { user_id, username })),
            _ => Ok(None),
        }
    }

    /// Remove a stored `user_id` that is not an integer. Returns whether one
    /// was removed.
    pub fn discard_malformed_user_id(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let malformed = query_item(conn, USER_ID_KEY)?.is_some_and(|id| id.parse::<i64>().is_err());
            if malformed {
                delete_item(conn, USER_ID_KEY)?;
            }
            Ok(malformed)
        })
    }

    /// True iff both identity keys resolve. A partial identity counts as
    /// signed out.
    pub fn is_user_connected(&self) -> Result<bool> {
        Ok(self.identity()?.is_some())
    }
}

use crate::models::CookieRow;
use crate::Store;
use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use jukebox_types::models::TokenKind;

impl Store {
    // -- Local storage --

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_item(conn, key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| upsert_item(conn, key, value))
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| delete_item(conn, key))
    }

    // -- Cookies --

    /// Returns the cookie value unless it is missing or expired.
    pub fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        self.with_conn(|conn| {
            let row = query_cookie(conn, name)?;
            match row {
                Some(row) if row.is_expired(now) => {
                    conn.execute("DELETE FROM cookies WHERE name = ?1", [name])?;
                    Ok(None)
                }
                Some(row) => Ok(Some(row.value)),
                None => Ok(None),
            }
        })
    }

    /// Store a cookie. `max_age` of `None` keeps it until removed, as does an
    /// age too large to represent as a date.
    pub fn set_cookie(&self, name: &str, value: &str, max_age: Option<Duration>) -> Result<()> {
        let expires_at = max_age
            .and_then(|age| Utc::now().checked_add_signed(age))
            .map(|at| at.timestamp());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cookies (name, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at,
                    updated_at = datetime('now')",
                rusqlite::params![name, value, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn remove_cookie(&self, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cookies WHERE name = ?1", [name])?;
            Ok(())
        })
    }

    // -- Tokens --

    pub fn token(&self, kind: TokenKind) -> Result<Option<String>> {
        self.get_cookie(kind.cookie_name())
    }

    pub fn set_token(&self, kind: TokenKind, value: &str, max_age: Option<Duration>) -> Result<()> {
        self.set_cookie(kind.cookie_name(), value, max_age)
    }

    pub fn remove_token(&self, kind: TokenKind) -> Result<()> {
        self.remove_cookie(kind.cookie_name())
    }
}

pub(crate) fn query_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM local_storage WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub(crate) fn upsert_item(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        (key, value),
    )?;
    Ok(())
}

pub(crate) fn delete_item(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
    Ok(())
}

fn query_cookie(conn: &Connection, name: &str) -> Result<Option<CookieRow>> {
    let row = conn
        .query_row(
            "SELECT value, expires_at FROM cookies WHERE name = ?1",
            [name],
            |row| {
                Ok(CookieRow {
                    value: row.get(0)?,
                    expires_at: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

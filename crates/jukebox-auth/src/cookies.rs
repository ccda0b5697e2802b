//! Credential jar plumbing: turning `Set-Cookie` responses into stored
//! tokens and stored tokens back into a `Cookie` request header.

use anyhow::Result;
use chrono::Duration;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::debug;

use jukebox_store::Store;
use jukebox_types::models::TokenKind;

/// The parts of a `Set-Cookie` header the client acts on.
#[derive(Debug, PartialEq, Eq)]
pub struct SetCookie<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub max_age: Option<i64>,
}

impl SetCookie<'_> {
    /// An empty value or a non-positive `Max-Age` asks us to forget the cookie.
    pub fn is_removal(&self) -> bool {
        self.value.is_empty() || self.max_age.is_some_and(|age| age <= 0)
    }
}

pub fn parse_set_cookie(header: &str) -> Option<SetCookie<'_>> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let max_age = parts.find_map(|attr| {
        let (key, val) = attr.split_once('=')?;
        key.trim().eq_ignore_ascii_case("max-age").then(|| val.trim().parse::<i64>().ok())?
    });

    Some(SetCookie { name, value, max_age })
}

/// Apply every token cookie found in `headers`. Unrelated cookies are ignored.
pub fn absorb_set_cookies(store: &Store, headers: &HeaderMap) -> Result<()> {
    for raw in headers.get_all(SET_COOKIE) {
        let Ok(raw) = raw.to_str() else { continue };
        let Some(cookie) = parse_set_cookie(raw) else { continue };
        let Some(kind) = TokenKind::from_cookie_name(cookie.name) else { continue };

        if cookie.is_removal() {
            debug!(%kind, "server cleared token");
            store.remove_token(kind)?;
        } else {
            debug!(%kind, max_age = ?cookie.max_age, "server issued token");
            store.set_token(kind, cookie.value, cookie.max_age.and_then(Duration::try_seconds))?;
        }
    }
    Ok(())
}

/// `Cookie` header carrying whichever tokens are currently stored.
pub fn cookie_header(store: &Store) -> Result<Option<String>> {
    let mut pairs = Vec::with_capacity(2);
    for kind in [TokenKind::Access, TokenKind::Refresh] {
        if let Some(token) = store.token(kind)? {
            pairs.push(format!("{}={}", kind.cookie_name(), token));
        }
    }
    Ok((!pairs.is_empty()).then(|| pairs.join("; ")))
}

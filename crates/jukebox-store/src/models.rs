/// Row types for the store tables.

pub struct CookieRow {
    pub value: String,
    /// Unix seconds; `None` never expires on its own.
    pub expires_at: Option<i64>,
}

impl CookieRow {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

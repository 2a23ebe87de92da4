/// Revocation entry for a token id or a whole principal
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationEntry {
    pub revoked_at: DateTime<Utc>,
    /// When the revoked token(s) would have expired anyway
    pub until: DateTime<Utc>,
}

impl RevocationEntry {
    /// Entry no longer needed once the token would have expired naturally
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.until <= now
    }
}

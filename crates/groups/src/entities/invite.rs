use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;

/// Invite codes expire a fixed seven days after issuance.
pub const INVITE_TTL_DAYS: i64 = 7;

/// An opaque group invite code. Codes are reusable until expiry and are
/// never revoked or deduplicated; six random bytes make collisions
/// negligible.
#[derive(Debug, Clone, Serialize)]
pub struct InviteCode {
    pub code: String,
    pub created_at: String,
    pub expires_at: String,
}

impl InviteCode {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        let code = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();

        Self {
            code,
            created_at: now.to_rfc3339(),
            expires_at: (now + Duration::days(INVITE_TTL_DAYS)).to_rfc3339(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires_at) => expires_at.with_timezone(&Utc) < now,
            Err(_) => true,
        }
    }
}

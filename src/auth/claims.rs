/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The `token_type` claim and
/// the per-kind signing secret together keep the two kinds apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two classes of token the codec issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (principal id as UUID string)
    pub sub: String,
    pub token_type: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Create claims for `principal_id` valid for `expiry_seconds` from `now`
    pub fn new(
        principal_id: Uuid,
        token_type: TokenKind,
        now: i64,
        expiry_seconds: i64,
        issuer: &str,
    ) -> Self {
        Self {
            sub: principal_id.to_string(),
            token_type,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Principal id carried in the subject, if it is a valid UUID
    pub fn principal_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

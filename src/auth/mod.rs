/// Authentication module
///
/// Token codec, password hashing, refresh-slot fingerprints, the session
/// manager and the per-request authenticator.

mod claims;
mod guard;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::{Claims, TokenKind};
pub use guard::{authenticate, bearer_token, AuthenticatedPrincipal};
pub use jwt::{TokenCodec, TokenError, TokenPair};
pub use password::{hash_password, verify_password};
pub use refresh_token::fingerprint;
pub use session::{AuthenticatedSession, SessionManager};

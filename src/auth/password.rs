/// Password Hashing and Verification
///
/// Policy checks (length, confirmation) live in `validators`; this module
/// only deals with bcrypt.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// bcrypt work factor
const HASH_COST: u32 = 10;

/// Hash a password using bcrypt with a random salt
///
/// # Errors
/// Returns error if bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, HASH_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

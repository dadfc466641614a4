//! User Records

use jiff::Timestamp;

/// User Record
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: i64,

    /// Unique email, stored as entered but matched case-insensitively.
    pub email: String,

    /// Argon2id password verifier (PHC string).
    pub password_hash: String,

    /// Account creation timestamp.
    pub created_at: Timestamp,
}

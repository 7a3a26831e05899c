use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose of a token. Each verifier accepts exactly one kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    PasswordReset,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // access or password_reset
}

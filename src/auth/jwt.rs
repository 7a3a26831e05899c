use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, TokenKind},
    config::JwtConfig,
    error::AppError,
    state::AppState,
};

/// Signing and verification keys plus the claims every token must carry.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((cfg.reset_ttl_minutes as u64) * 60),
        }
    }

    fn sign_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::PasswordReset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(AppError::internal)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign_at(user_id, TokenKind::Access, OffsetDateTime::now_utc())
    }

    pub fn sign_password_reset(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign_at(user_id, TokenKind::PasswordReset, OffsetDateTime::now_utc())
    }

    /// Checks signature, expiry, issuer, audience and purpose. Any failure
    /// is `invalid_jwt`.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AppError::InvalidJwt
        })?;
        if data.claims.kind != expected {
            warn!(
                user_id = %data.claims.sub,
                kind = ?data.claims.kind,
                expected = ?expected,
                "jwt used for the wrong purpose"
            );
            return Err(AppError::InvalidJwt);
        }
        Ok(data.claims)
    }
}

use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::constants::TOKEN_SCHEMES;
use crate::database::schema::User;
use crate::error::{Error, ErrorKind};
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, lifetime_hours: i64) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role.to_owned(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }
}

/// Caller identity, resolved from a verified token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub token_id: String,
    pub expires_at: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(ErrorKind::Forbidden.default());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            role: value.role,
            token_id: value.jti,
            expires_at: value.exp,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Invalid signing key: {e}");
        ErrorKind::InternalServerError.default()
    })
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user, lifetime_hours);

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign token: {e}");
        ErrorKind::InternalServerError.new("Failed to sign token")
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ErrorKind::Unauthorized.new("Invalid token"))?;

    if session.exp < Utc::now().timestamp() {
        return Err(ErrorKind::Unauthorized.new("Token expired"));
    }
    Ok(session)
}

/// Token of an `Authorization: Token <jwt>` (or `Bearer <jwt>`) header.
pub fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if !TOKEN_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 5,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            password: String::new(),
            avatar: None,
            role,
        }
    }

    #[test]
    fn signed_token_verifies() {
        let token = generate_jwt_session(&user(UserRole::Admin), "secret", 1).unwrap();

        let session: SessionData = verify_jwt_session(&token, "secret").unwrap().into();

        assert_eq!(session.user_id, 5);
        assert_eq!(session.username, "cook");
        assert_eq!(session.role, UserRole::Admin);
        assert!(!session.token_id.is_empty());
    }

    #[test]
    fn every_token_has_its_own_id() {
        let a = JwtSessionData::new(&user(UserRole::User), 1);
        let b = JwtSessionData::new(&user(UserRole::User), 1);

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", 1).unwrap();

        let error = verify_jwt_session(&token, "other").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", -1).unwrap();

        let error = verify_jwt_session(&token, "secret").unwrap_err();

        assert_eq!(error.info.as_deref(), Some("Token expired"));
    }

    #[test]
    fn garbage_is_unauthorized() {
        assert!(verify_jwt_session("not.a.token", "secret").is_err());
    }

    #[test]
    fn reads_token_and_bearer_schemes() {
        assert_eq!(token_from_header("Token abc"), Some("abc"));
        assert_eq!(token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(token_from_header("token  abc "), Some("abc"));
        assert_eq!(token_from_header("Basic abc"), None);
        assert_eq!(token_from_header("Token"), None);
    }
}

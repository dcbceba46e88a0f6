use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::config::{ConfigStore, SECRET_KEY};
use crate::error::ForumError;
use crate::models::Uid;
use crate::routes::AppState;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Decimal uid.
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn uid(&self) -> Option<Uid> {
        self.sub.parse().ok()
    }
}

/// Validate a JWT and return its claims.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Issue a token whose subject is `uid`.
pub fn create_jwt(uid: Uid, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = Claims { sub: uid.to_string(), exp: expiration };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Extractor yielding the authenticated uid. The secret comes from the
/// config store of the running app.
pub struct Auth(pub Uid);

impl FromRequest for Auth {
    type Error = ForumError;
    type Future = Ready<Result<Self, ForumError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(ForumError::Unauthenticated));
        };
        let Some(secret) = state.forum.config().get(SECRET_KEY) else {
            tracing::error!("{SECRET_KEY} is not configured");
            return ready(Err(ForumError::Unauthenticated));
        };
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ForumError::Unauthenticated));
        };
        let uid = decode_jwt(bearer.token(), &secret).ok().and_then(|c| c.uid());
        ready(uid.map(Auth).ok_or(ForumError::Unauthenticated))
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner id, not the username: accounts can be renamed.
    pub sub: String,
    pub exp: i64,
}

pub fn encode(secret: &str, claims: &Claims) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn decode(secret: &str, token: &str) -> Result<Claims, AppError> {
    Ok(jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Unauthorized(e.to_string()))?
    .claims)
}

pub fn gen_token(config: &Config, owner_id: &str) -> String {
    let claims = Claims {
        sub: owner_id.to_string(),
        exp: (Utc::now() + Duration::seconds(config.jwt_lifetime_secs)).timestamp(),
    };
    encode(&config.jwt_secret, &claims)
}

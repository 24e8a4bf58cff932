pub mod asset;
pub mod user;

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn check_password(expected_hash: &str, actual: &str) -> Result<(), AppError> {
    if bcrypt::verify(actual, expected_hash)? {
        return Ok(());
    }
    Err(AppError::InvalidCredentials)
}

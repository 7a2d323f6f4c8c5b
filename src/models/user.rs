//! User model, JWT claims and related request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub use super::enums::Role;
use crate::error::AppError;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 5, message = "Password must be at least 5 characters"))]
    pub password: String,
    #[validate(
        length(min = 1, max = 150),
        custom(function = "validate_person_name")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 150),
        custom(function = "validate_person_name")
    )]
    pub last_name: String,
}

/// Update own profile request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 5, message = "Password must be at least 5 characters"))]
    pub password: Option<String>,
    #[validate(
        length(min = 1, max = 150),
        custom(function = "validate_person_name")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 150),
        custom(function = "validate_person_name")
    )]
    pub last_name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// First and last names must contain only letters.
pub fn validate_person_name(name: &str) -> Result<(), ValidationError> {
    if !name.is_empty() && name.chars().all(char::is_alphabetic) {
        Ok(())
    } else {
        let mut err = ValidationError::new("name");
        err.message =
            Some("The first name and the last name must contain only letters.".into());
        Err(err)
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User email
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (expiration_hours as i64 * 3600),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

//! Account registration, login and profile management

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, Role, UpdateProfile, User, UserClaims},
    repository::{
        users::{NewUser, ProfileChanges},
        Repository,
    },
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Create a reader account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;

        if self.repository.users.email_exists(&request.email, None).await? {
            return Err(AppError::Conflict("A user with this email already exists".to_string()));
        }

        let user = self
            .repository
            .users
            .create(&NewUser {
                email: request.email.trim().to_lowercase(),
                first_name: request.first_name,
                last_name: request.last_name,
                password_hash: hash_password(&request.password)?,
                role: Role::Reader,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Authenticate by email and password and return a JWT token
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&user.password_hash, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let token = UserClaims::new(&user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok((token, user))
    }

    /// Validate a bearer token issued by [`Self::authenticate`]
    pub fn claims_from_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }

    pub async fn get_me(&self, actor: &UserClaims) -> AppResult<User> {
        self.repository.users.get_by_id(actor.user_id).await
    }

    pub async fn update_me(&self, actor: &UserClaims, request: UpdateProfile) -> AppResult<User> {
        request.validate()?;

        let email = request.email.map(|e| e.trim().to_lowercase());
        if let Some(ref email) = email {
            if self.repository.users.email_exists(email, Some(actor.user_id)).await? {
                return Err(AppError::Conflict("A user with this email already exists".to_string()));
            }
        }

        let password_hash = match request.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        self.repository
            .users
            .update_profile(
                actor.user_id,
                &ProfileChanges {
                    email,
                    first_name: request.first_name,
                    last_name: request.last_name,
                    password_hash,
                },
            )
            .await
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

//! Authentication service: login, token issuance, refresh rotation and logout

use chrono::Duration;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        auth::{LoginResponse, TokenPair},
        user::{RegisterUser, User, UserClaims},
    },
    repository::Repository,
    services::users::{verify_password, UsersService},
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    users: UsersService,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, users: UsersService, config: AuthConfig) -> Self {
        Self {
            repository,
            users,
            config,
        }
    }

    /// Resolve a bearer access token into the caller identity
    pub fn verify_access_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.access_token_secret).map_err(|e| {
            tracing::warn!("Rejected access token: {}", e);
            AppError::Authentication("Invalid or expired token".to_string())
        })
    }

    fn issue_tokens(&self, user: &User) -> AppResult<TokenPair> {
        let access = UserClaims::for_user(
            user,
            Duration::minutes(self.config.access_token_expiration_minutes),
        );
        let refresh = UserClaims::for_user(
            user,
            Duration::days(self.config.refresh_token_expiration_days),
        );

        let access_token = access
            .create_token(&self.config.access_token_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        let refresh_token = refresh
            .create_token(&self.config.refresh_token_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Self-service registration; always creates a borrower
    pub async fn register(&self, user: RegisterUser) -> AppResult<User> {
        self.users.create(user.into()).await
    }

    /// Check credentials and open a session
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            tracing::warn!(username = %username, "Failed login attempt");
            return Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        let tokens = self.issue_tokens(&user)?;
        self.repository
            .authentications
            .add(user.user_id, &tokens.refresh_token)
            .await?;

        tracing::info!(user_id = %user.user_id, "User logged in");

        Ok(LoginResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Exchange a stored refresh token for a new token pair. The old refresh
    /// token is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = UserClaims::from_token(refresh_token, &self.config.refresh_token_secret)
            .map_err(|_| AppError::Validation("Refresh token is not valid".to_string()))?;

        // Role may have changed since the token was issued
        let user = self.repository.users.get_by_id(claims.user_id).await?;
        let tokens = self.issue_tokens(&user)?;

        self.repository
            .authentications
            .rotate(user.user_id, refresh_token, &tokens.refresh_token)
            .await?;

        Ok(tokens)
    }

    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        self.repository.authentications.remove(refresh_token).await
    }

    pub async fn me(&self, claims: &UserClaims) -> AppResult<User> {
        self.repository.users.get_by_id(claims.user_id).await
    }
}

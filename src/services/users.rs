//! User management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, UpdateUser, User, UserClaims},
    repository::{users::NewUser, Repository},
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    /// Get a user; borrowers may only read themselves
    pub async fn get(&self, claims: &UserClaims, id: Uuid) -> AppResult<User> {
        claims.require_self_or_admin(id)?;
        self.repository.users.get_by_id(id).await
    }

    /// Create a user. A blank password falls back to the username.
    pub async fn create(&self, user: CreateUser) -> AppResult<User> {
        if self.repository.users.username_exists(&user.username, None).await? {
            return Err(AppError::Validation(format!(
                "username: {} is already taken",
                user.username
            )));
        }

        let password = user
            .password
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&user.username);
        let password_hash = hash_password(password)?;

        let created = self
            .repository
            .users
            .create(NewUser {
                name: &user.name,
                username: &user.username,
                password_hash: &password_hash,
                email: user.email.as_deref(),
                phone: user.phone.as_deref(),
                role: user.role.unwrap_or(Role::Borrower),
            })
            .await?;

        tracing::info!(user_id = %created.user_id, role = %created.role, "User created");
        Ok(created)
    }

    /// Update profile fields of a user (self or staff)
    pub async fn update(&self, claims: &UserClaims, id: Uuid, user: UpdateUser) -> AppResult<User> {
        claims.require_self_or_admin(id)?;
        let target = self.repository.users.get_by_id(id).await?;
        claims.require_can_edit(id, target.role)?;

        if let Some(ref username) = user.username {
            if self.repository.users.username_exists(username, Some(id)).await? {
                return Err(AppError::Validation(format!(
                    "username: {} is already taken",
                    username
                )));
            }
        }

        let password_hash = user.password.as_deref().map(hash_password).transpose()?;

        self.repository.users.update(id, &user, password_hash).await
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!(user_id = %id, role = %role, "User role changed");
        Ok(user)
    }

    pub async fn delete(&self, claims: &UserClaims, id: Uuid) -> AppResult<()> {
        if claims.user_id == id {
            return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
        }
        self.repository.users.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("rahasia").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "rahasia").unwrap());
        assert!(!verify_password(&hash, "salah").unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("not-a-hash", "x").is_err());
    }
}

//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::user::{Role, UpdateUser, User},
};

/// Fields of a new user row, password already hashed
pub struct NewUser<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub role: Role,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username (login name)
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if a username is already taken
    pub async fn username_exists(&self, username: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::uuid IS NULL OR user_id != $2))",
        )
        .bind(username)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// List all users, newest first
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Create a new user
    pub async fn create(&self, user: NewUser<'_>) -> AppResult<User> {
        let now = Utc::now();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, name, username, password, email, phone, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation(format!("username: {} is already taken", user.username))
            } else {
                e.into()
            }
        })
    }

    /// Update profile fields. Only the fields present are written.
    pub async fn update(&self, id: Uuid, user: &UpdateUser, password_hash: Option<String>) -> AppResult<User> {
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(user.name, "name");
        add_field!(user.username, "username");
        add_field!(user.email, "email");
        add_field!(user.phone, "phone");
        add_field!(password_hash, "password");

        let query = format!(
            "UPDATE users SET {} WHERE user_id = ${} RETURNING *",
            sets.join(", "),
            param_idx
        );

        let mut builder = sqlx::query_as::<_, User>(&query).bind(Utc::now());

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(user.name);
        bind_field!(user.username);
        bind_field!(user.email);
        bind_field!(user.phone);
        bind_field!(password_hash);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Validation("username: is already taken".to_string())
                } else {
                    e.into()
                }
            })?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Change the role of a user
    pub async fn update_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = $2 WHERE user_id = $3 RETURNING *",
        )
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Delete a user that never took part in a loan
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        let has_loans: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loan_participants WHERE user_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if has_loans {
            return Err(AppError::Conflict(
                "User has loan history and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM authentications WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

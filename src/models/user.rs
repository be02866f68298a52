//! User model, roles and token claims

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9+]+$").expect("valid phone regex"));

/// User role. Roles are matched as a set, never as a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Superadmin,
    Borrower,
}

/// Staff roles allowed to manage the catalog and approve loans
pub const ADMINS: &[Role] = &[Role::Admin, Role::Superadmin];
pub const SUPERADMIN_ONLY: &[Role] = &[Role::Superadmin];
pub const BORROWER_ONLY: &[Role] = &[Role::Borrower];
/// Any authenticated user
pub const ANY: &[Role] = &[];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Superadmin => "SUPERADMIN",
            Role::Borrower => "BORROWER",
        }
    }

    pub fn is_staff(&self) -> bool {
        ADMINS.contains(self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "SUPERADMIN" => Ok(Role::Superadmin),
            "BORROWER" => Ok(Role::Borrower),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl_text_type!(Role);

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short user representation embedded in loans
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
}

/// Self-service registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,
    /// Defaults to the username when omitted or blank
    pub password: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone may only contain digits and '+'"))]
    pub phone: Option<String>,
}

/// Create user request (superadmin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,
    pub password: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone may only contain digits and '+'"))]
    pub phone: Option<String>,
    /// Defaults to BORROWER
    pub role: Option<Role>,
}

impl From<RegisterUser> for CreateUser {
    fn from(user: RegisterUser) -> Self {
        Self {
            name: user.name,
            username: user.username,
            password: user.password,
            email: user.email,
            phone: user.phone,
            role: Some(Role::Borrower),
        }
    }
}

/// Update user request. The role is changed through [`UpdateRole`] only.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone may only contain digits and '+'"))]
    pub phone: Option<String>,
}

/// Update role request (superadmin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: Role,
}

/// JWT claims, also the resolved identity of an authenticated request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub role: Role,
    /// Unique token id; keeps two tokens issued in the same second distinct
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.user_id.to_string(),
            user_id: user.user_id,
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            jti: Uuid::new_v4(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
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

    /// Parse and verify a JWT token (signature and expiry)
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Role gate. An empty `allowed` set admits any authenticated user,
    /// otherwise the role must be a member of the set.
    pub fn authorize(&self, allowed: &[Role]) -> AppResult<&Self> {
        if allowed.is_empty() || allowed.contains(&self.role) {
            Ok(self)
        } else {
            Err(AppError::Authorization(format!(
                "Role {} cannot access this resource",
                self.role
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_staff()
    }

    /// Allow the user themself or staff
    pub fn require_self_or_admin(&self, user_id: Uuid) -> AppResult<()> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Access denied".to_string()))
        }
    }

    /// Gate for editing another account. Staff may edit others, but a
    /// SUPERADMIN account is only editable by itself or another SUPERADMIN.
    pub fn require_can_edit(&self, target_id: Uuid, target_role: Role) -> AppResult<()> {
        self.require_self_or_admin(target_id)?;
        if self.user_id != target_id
            && target_role == Role::Superadmin
            && self.role != Role::Superadmin
        {
            return Err(AppError::Authorization(
                "Only a superadmin can edit a superadmin account".to_string(),
            ));
        }
        Ok(())
    }

    /// Loan ownership gate. A missing loan (`owner` is `None`) is reported
    /// the same way as someone else's loan.
    pub fn require_owner_or_admin(&self, owner: Option<Uuid>) -> AppResult<()> {
        if self.is_admin() || owner == Some(self.user_id) {
            Ok(())
        } else {
            Err(AppError::Authorization("Access denied".to_string()))
        }
    }
}

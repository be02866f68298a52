//! Business logic services

pub mod auth;
pub mod catalog;
pub mod loans;
pub mod stats;
pub mod users;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let users = users::UsersService::new(repository.clone());

        Self {
            auth: auth::AuthService::new(repository.clone(), users.clone(), auth_config),
            users,
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            stats: stats::StatsService::new(repository),
        }
    }
}

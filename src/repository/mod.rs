//! Repository layer for database operations

pub mod authentications;
pub mod categories;
pub mod loans;
pub mod products;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub authentications: authentications::AuthenticationsRepository,
    pub categories: categories::CategoriesRepository,
    pub products: products::ProductsRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            authentications: authentications::AuthenticationsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            products: products::ProductsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

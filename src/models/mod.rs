//! Data models for Wisma

/// Stores an enum as TEXT using its `as_str` / `FromStr` pair.
macro_rules! impl_text_type {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub mod auth;
pub mod category;
pub mod loan;
pub mod product;
pub mod stats;
pub mod user;

// Re-export commonly used types
pub use category::Category;
pub use loan::{Loan, LoanDetails, LoanStatus, LoanTransition, ParticipantRole};
pub use product::{Product, ProductUnit, UnitCondition, UnitStatus};
pub use user::{Role, User, UserClaims, UserShort};

//! Loans repository
//!
//! Every loan mutation runs in one transaction: the loan row is locked with
//! `FOR UPDATE`, the status guard is evaluated against the locked row, and
//! the unit writes are committed together with the status write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        loan::{
            plan_unit_changes, CreateLoan, HeldUnit, Loan, LoanDetails, LoanHistoryEntry, LoanItem,
            LoanItemRequest, LoanParticipant, LoanStatus, LoanTransition, ParticipantRole, Report, ReportPayload,
        },
        product::{UnitCondition, UnitStatus},
        user::{Role, UserShort},
    },
};

/// Unit row read under lock while building a loan
#[derive(Debug, FromRow)]
struct CandidateUnit {
    unit_id: Uuid,
    product_id: Uuid,
    serial_number: String,
    status: UnitStatus,
}

/// Outcome of a committed transition
#[derive(Debug, Clone, Copy)]
pub struct TransitionOutcome {
    pub from: LoanStatus,
    pub to: LoanStatus,
    pub units_changed: usize,
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

/// Every invitee must exist and be a borrower
fn check_invitees(invited: &[Uuid], found: &[(Uuid, Role)]) -> AppResult<()> {
    for id in invited {
        match found.iter().find(|(user_id, _)| user_id == id) {
            None => return Err(AppError::NotFound(format!("User with id {} not found", id))),
            Some((_, role)) if *role != Role::Borrower => {
                return Err(AppError::BadRequest(format!(
                    "User {} is {} and cannot be invited to a loan",
                    id, role
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Pick `quantity` AVAILABLE units of each requested product. Units already
/// in `units` and rows locked by other transactions are skipped.
async fn pick_units(
    tx: &mut Transaction<'_, Postgres>,
    items: &[LoanItemRequest],
    units: &mut Vec<CandidateUnit>,
) -> AppResult<()> {
    for item in items {
        let taken: Vec<Uuid> = units.iter().map(|u| u.unit_id).collect();
        let picked: Vec<CandidateUnit> = sqlx::query_as(
            r#"
            SELECT unit_id, product_id, serial_number, status
            FROM product_units
            WHERE product_id = $1 AND status = 'AVAILABLE' AND unit_id != ALL($2)
            ORDER BY serial_number
            LIMIT $3
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(item.product_id)
        .bind(&taken)
        .bind(item.quantity)
        .fetch_all(&mut **tx)
        .await?;

        if (picked.len() as i64) < item.quantity {
            let product_name: Option<String> =
                sqlx::query_scalar("SELECT product_name FROM products WHERE product_id = $1")
                    .bind(item.product_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            return Err(match product_name {
                None => AppError::NotFound(format!("Product with id {} not found", item.product_id)),
                Some(name) => AppError::Conflict(format!(
                    "Only {} unit(s) of {} available, {} requested",
                    picked.len(),
                    name,
                    item.quantity
                )),
            });
        }

        units.extend(picked);
    }
    Ok(())
}

/// Attach units to a loan and mark them RESERVED
async fn reserve_units(
    tx: &mut Transaction<'_, Postgres>,
    loan_id: Uuid,
    units: &[CandidateUnit],
    now: DateTime<Utc>,
) -> AppResult<()> {
    for unit in units {
        sqlx::query(
            "INSERT INTO loan_items (loan_item_id, loan_id, unit_id, product_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(loan_id)
        .bind(unit.unit_id)
        .bind(unit.product_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Unit {} is already booked", unit.serial_number))
            } else {
                e.into()
            }
        })?;
    }

    let unit_ids: Vec<Uuid> = units.iter().map(|u| u.unit_id).collect();
    sqlx::query("UPDATE product_units SET status = $1, updated_at = $2 WHERE unit_id = ANY($3)")
        .bind(UnitStatus::Reserved)
        .bind(now)
        .bind(&unit_ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE loan_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Owner participant of a loan
    pub async fn owner_id(&self, loan_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM loan_participants WHERE loan_id = $1 AND role = 'OWNER'",
        )
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    /// Active loan owned by a user, if any
    pub async fn active_owned_by(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
        let loan_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT l.loan_id
            FROM loans l
            JOIN loan_participants lp ON lp.loan_id = l.loan_id
            WHERE lp.user_id = $1 AND lp.role = 'OWNER'
              AND l.status IN ('REQUESTED', 'APPROVED')
            ORDER BY l.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan_id)
    }

    /// Loan with borrower, items, participants and report
    pub async fn get_details(&self, id: Uuid) -> AppResult<LoanDetails> {
        let loan = self.get_by_id(id).await?;

        let borrower = sqlx::query_as::<_, UserShort>(
            "SELECT user_id, name, username FROM users WHERE user_id = $1",
        )
        .bind(loan.borrower_id)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, LoanItem>(
            r#"
            SELECT li.loan_item_id, li.unit_id, li.product_id, p.product_name,
                   pu.serial_number, pu.condition, pu.status, li.released_at
            FROM loan_items li
            JOIN product_units pu ON pu.unit_id = li.unit_id
            JOIN products p ON p.product_id = li.product_id
            WHERE li.loan_id = $1
            ORDER BY p.product_name, pu.serial_number
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let participants = sqlx::query_as::<_, LoanParticipant>(
            r#"
            SELECT lp.id, lp.loan_id, lp.user_id, u.name, u.username, lp.role, lp.created_at
            FROM loan_participants lp
            JOIN users u ON u.user_id = lp.user_id
            WHERE lp.loan_id = $1
            ORDER BY (lp.role = 'OWNER') DESC, lp.created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let report = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE loan_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(LoanDetails {
            loan,
            borrower,
            items,
            participants,
            report,
        })
    }

    /// All loans, optionally filtered by status
    pub async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Loans a user takes part in, with their participant role
    pub async fn history(&self, user_id: Uuid) -> AppResult<Vec<LoanHistoryEntry>> {
        let entries = sqlx::query_as::<_, LoanHistoryEntry>(
            r#"
            SELECT l.*, lp.role AS user_role,
                   (SELECT COUNT(*) FROM loan_items li WHERE li.loan_id = l.loan_id) AS item_count
            FROM loans l
            JOIN loan_participants lp ON lp.loan_id = l.loan_id
            WHERE lp.user_id = $1
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Create a loan in REQUESTED state and reserve its units
    pub async fn create(&self, borrower_id: Uuid, request: &CreateLoan) -> AppResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent requests of the same borrower
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
            .bind(borrower_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", borrower_id)))?;

        let active: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT l.loan_id
            FROM loans l
            JOIN loan_participants lp ON lp.loan_id = l.loan_id
            WHERE lp.user_id = $1 AND lp.role = 'OWNER'
              AND l.status IN ('REQUESTED', 'APPROVED')
            LIMIT 1
            "#,
        )
        .bind(borrower_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(loan_id) = active {
            return Err(AppError::Conflict(format!(
                "An active loan {} already exists for this user",
                loan_id
            )));
        }

        // Named units
        let requested = dedup(&request.unit_ids);
        let mut units: Vec<CandidateUnit> = sqlx::query_as(
            r#"
            SELECT unit_id, product_id, serial_number, status
            FROM product_units
            WHERE unit_id = ANY($1)
            ORDER BY unit_id
            FOR UPDATE
            "#,
        )
        .bind(&requested)
        .fetch_all(&mut *tx)
        .await?;

        for id in &requested {
            let unit = units
                .iter()
                .find(|u| u.unit_id == *id)
                .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", id)))?;
            if unit.status != UnitStatus::Available {
                return Err(AppError::Conflict(format!(
                    "Unit {} is {} and cannot be borrowed",
                    unit.serial_number, unit.status
                )));
            }
        }

        // Units resolved per product
        pick_units(&mut tx, &request.items, &mut units).await?;

        // Co-borrowers
        let invited: Vec<Uuid> = dedup(&request.invited_user_ids)
            .into_iter()
            .filter(|id| *id != borrower_id)
            .collect();

        if !invited.is_empty() {
            let found: Vec<(Uuid, Role)> =
                sqlx::query_as("SELECT user_id, role FROM users WHERE user_id = ANY($1)")
                    .bind(&invited)
                    .fetch_all(&mut *tx)
                    .await?;
            check_invitees(&invited, &found)?;
        }

        let now = Utc::now();
        let loan_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO loans (loan_id, borrower_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(loan_id)
        .bind(borrower_id)
        .bind(LoanStatus::Requested)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        reserve_units(&mut tx, loan_id, &units, now).await?;

        let participants = std::iter::once((borrower_id, ParticipantRole::Owner))
            .chain(invited.iter().map(|id| (*id, ParticipantRole::Invited)));

        for (user_id, role) in participants {
            sqlx::query(
                r#"
                INSERT INTO loan_participants (id, loan_id, user_id, role, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(loan_id)
            .bind(user_id)
            .bind(role)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(loan_id)
    }

    /// Replace the units of a REQUESTED loan with a fresh pick per product
    pub async fn update_items(&self, loan_id: Uuid, items: &[LoanItemRequest]) -> AppResult<usize> {
        let mut tx = self.pool.begin().await?;

        let status: LoanStatus =
            sqlx::query_scalar("SELECT status FROM loans WHERE loan_id = $1 FOR UPDATE")
                .bind(loan_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        status.ensure_items_editable()?;

        let held: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT pu.unit_id
            FROM loan_items li
            JOIN product_units pu ON pu.unit_id = li.unit_id
            WHERE li.loan_id = $1 AND li.released_at IS NULL
            ORDER BY pu.unit_id
            FOR UPDATE OF pu
            "#,
        )
        .bind(loan_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();

        sqlx::query("DELETE FROM loan_items WHERE loan_id = $1 AND released_at IS NULL")
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE product_units SET status = $1, updated_at = $2 WHERE unit_id = ANY($3)")
            .bind(UnitStatus::Available)
            .bind(now)
            .bind(&held)
            .execute(&mut *tx)
            .await?;

        let mut units = Vec::new();
        pick_units(&mut tx, items, &mut units).await?;
        reserve_units(&mut tx, loan_id, &units, now).await?;

        sqlx::query("UPDATE loans SET updated_at = $1 WHERE loan_id = $2")
            .bind(now)
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(units.len())
    }

    /// Apply a lifecycle transition atomically
    pub async fn transition(
        &self,
        loan_id: Uuid,
        transition: LoanTransition,
        conditions: &HashMap<Uuid, UnitCondition>,
        report: Option<&ReportPayload>,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: LoanStatus =
            sqlx::query_scalar("SELECT status FROM loans WHERE loan_id = $1 FOR UPDATE")
                .bind(loan_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        let next = current.apply(transition)?;

        let units: Vec<HeldUnit> = sqlx::query_as(
            r#"
            SELECT pu.unit_id, pu.status
            FROM loan_items li
            JOIN product_units pu ON pu.unit_id = li.unit_id
            WHERE li.loan_id = $1
            ORDER BY pu.unit_id
            FOR UPDATE OF pu
            "#,
        )
        .bind(loan_id)
        .fetch_all(&mut *tx)
        .await?;

        let changes = plan_unit_changes(transition, current, &units, conditions)?;
        let now = Utc::now();

        for change in &changes {
            sqlx::query(
                r#"
                UPDATE product_units SET
                    status = $1,
                    condition = COALESCE($2, condition),
                    updated_at = $3
                WHERE unit_id = $4
                "#,
            )
            .bind(change.status)
            .bind(change.condition)
            .bind(now)
            .bind(change.unit_id)
            .execute(&mut *tx)
            .await?;
        }

        if !next.is_active() {
            sqlx::query("UPDATE loan_items SET released_at = $1 WHERE loan_id = $2 AND released_at IS NULL")
                .bind(now)
                .bind(loan_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(report) = report {
            sqlx::query(
                r#"
                INSERT INTO reports (report_id, loan_id, spt_number, destination, place_of_execution,
                                     start_date, end_date, notes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(loan_id)
            .bind(&report.spt_number)
            .bind(&report.destination)
            .bind(&report.place_of_execution)
            .bind(report.start_date)
            .bind(report.end_date)
            .bind(&report.notes)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("A report was already filed for this loan".to_string())
                } else {
                    e.into()
                }
            })?;
        }

        let approved_at = (next == LoanStatus::Approved).then_some(now);
        let returned_at = (transition == LoanTransition::Return
            || (transition == LoanTransition::Complete && current == LoanStatus::Approved))
            .then_some(now);
        let completed_at = next.is_terminal().then_some(now);

        sqlx::query(
            r#"
            UPDATE loans SET
                status = $1,
                updated_at = $2,
                approved_at = COALESCE($3, approved_at),
                returned_at = COALESCE($4, returned_at),
                completed_at = COALESCE($5, completed_at)
            WHERE loan_id = $6
            "#,
        )
        .bind(next)
        .bind(now)
        .bind(approved_at)
        .bind(returned_at)
        .bind(completed_at)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransitionOutcome {
            from: current,
            to: next,
            units_changed: changes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup(&[a, b, a, b, a]), vec![a, b]);
        assert!(dedup(&[]).is_empty());
    }

    #[test]
    fn test_only_borrowers_can_be_invited() {
        let borrower = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let found = vec![(borrower, Role::Borrower), (admin, Role::Admin)];

        assert!(check_invitees(&[borrower], &found).is_ok());
        assert!(matches!(
            check_invitees(&[borrower, admin], &found),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            check_invitees(&[Uuid::new_v4()], &found),
            Err(AppError::NotFound(_))
        ));
    }
}

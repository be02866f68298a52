//! Loan lifecycle service
//!
//! Authorization is two-layered: the caller's role is checked against the
//! transition first, then ownership of the loan for non-staff callers.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::{not_found_as_none, AppResult},
    models::{
        loan::{
            CompleteLoan, CreateLoan, Loan, LoanCheck, LoanDetails, LoanHistoryEntry, LoanStatus,
            LoanTransition, ReportPayload, ReturnLoan, UpdateLoanItems,
        },
        product::UnitCondition,
        user::{UserClaims, ADMINS, BORROWER_ONLY},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Request a loan for the calling borrower
    pub async fn create(&self, claims: &UserClaims, request: &CreateLoan) -> AppResult<LoanDetails> {
        claims.authorize(BORROWER_ONLY)?;
        request.check_not_empty()?;

        let loan_id = self.repository.loans.create(claims.user_id, request).await?;
        let details = self.repository.loans.get_details(loan_id).await?;

        tracing::info!(
            loan_id = %loan_id,
            borrower_id = %claims.user_id,
            units = details.items.len(),
            "Loan requested"
        );

        Ok(details)
    }

    pub async fn list(&self, status: Option<LoanStatus>) -> AppResult<Vec<Loan>> {
        self.repository.loans.list(status).await
    }

    pub async fn history(&self, claims: &UserClaims) -> AppResult<Vec<LoanHistoryEntry>> {
        self.repository.loans.history(claims.user_id).await
    }

    /// Whether the caller may open a new loan right now
    pub async fn check(&self, claims: &UserClaims) -> AppResult<LoanCheck> {
        if claims.authorize(BORROWER_ONLY).is_err() {
            return Ok(LoanCheck {
                can_borrow: false,
                reason: Some("Only borrowers can request loans".to_string()),
                active_loan_id: None,
            });
        }

        let check = match self.repository.loans.active_owned_by(claims.user_id).await? {
            Some(loan_id) => LoanCheck {
                can_borrow: false,
                reason: Some("You already have an active loan".to_string()),
                active_loan_id: Some(loan_id),
            },
            None => LoanCheck {
                can_borrow: true,
                reason: None,
                active_loan_id: None,
            },
        };

        Ok(check)
    }

    /// Loan details for its owner or staff
    pub async fn get(&self, claims: &UserClaims, id: Uuid) -> AppResult<LoanDetails> {
        self.ensure_owner(claims, id).await?;
        self.repository.loans.get_details(id).await
    }

    pub async fn approve(&self, claims: &UserClaims, id: Uuid) -> AppResult<LoanDetails> {
        self.apply(claims, id, LoanTransition::Approve, &HashMap::new(), None)
            .await
    }

    pub async fn reject(&self, claims: &UserClaims, id: Uuid) -> AppResult<LoanDetails> {
        self.apply(claims, id, LoanTransition::Reject, &HashMap::new(), None)
            .await
    }

    /// Hand the units back, optionally with a report and per-unit conditions
    pub async fn return_loan(&self, claims: &UserClaims, id: Uuid, request: &ReturnLoan) -> AppResult<LoanDetails> {
        if let Some(report) = &request.report {
            report.check_dates()?;
        }

        let details = self
            .apply(
                claims,
                id,
                LoanTransition::Return,
                &request.unit_conditions,
                request.report.as_ref(),
            )
            .await?;

        // Staff are notified through the log stream
        tracing::info!(
            loan_id = %id,
            returned_by = %claims.user_id,
            with_report = request.report.is_some(),
            "Loan return requested, awaiting confirmation"
        );

        Ok(details)
    }

    /// Staff confirmation that closes the loan
    pub async fn complete(&self, claims: &UserClaims, id: Uuid, request: &CompleteLoan) -> AppResult<LoanDetails> {
        self.apply(claims, id, LoanTransition::Complete, &request.unit_conditions, None)
            .await
    }

    /// Swap the units of a loan that is still awaiting a decision
    pub async fn update_items(&self, claims: &UserClaims, id: Uuid, request: &UpdateLoanItems) -> AppResult<LoanDetails> {
        claims.authorize(ADMINS)?;

        let units = self.repository.loans.update_items(id, &request.items).await?;

        tracing::info!(
            loan_id = %id,
            edited_by = %claims.user_id,
            units,
            "Loan items updated"
        );

        self.repository.loans.get_details(id).await
    }

    /// Non-staff callers must own the loan; a missing loan is not revealed
    async fn ensure_owner(&self, claims: &UserClaims, id: Uuid) -> AppResult<()> {
        if claims.is_admin() {
            return Ok(());
        }
        let owner = not_found_as_none(self.repository.loans.owner_id(id).await)?;
        claims.require_owner_or_admin(owner)
    }

    async fn apply(
        &self,
        claims: &UserClaims,
        id: Uuid,
        transition: LoanTransition,
        conditions: &HashMap<Uuid, UnitCondition>,
        report: Option<&ReportPayload>,
    ) -> AppResult<LoanDetails> {
        claims.authorize(transition.allowed_roles())?;

        self.ensure_owner(claims, id).await?;

        let outcome = self
            .repository
            .loans
            .transition(id, transition, conditions, report)
            .await?;

        tracing::info!(
            loan_id = %id,
            actor = %claims.user_id,
            from = %outcome.from,
            to = %outcome.to,
            units = outcome.units_changed,
            "Loan transition applied"
        );

        self.repository.loans.get_details(id).await
    }
}

//! Loan model and lifecycle
//!
//! A loan moves through `REQUESTED -> APPROVED | REJECTED`, then
//! `APPROVED -> RETURNED` and finally `APPROVED | RETURNED -> DONE`.
//! Everything in this module is pure; the repository applies the results
//! inside a single transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{
    product::{UnitCondition, UnitStatus},
    user::{Role, UserShort, ADMINS},
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Requested,
    Approved,
    Rejected,
    Returned,
    Done,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "REQUESTED",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Done => "DONE",
        }
    }

    /// Loan still holds its units
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Requested | LoanStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Rejected | LoanStatus::Done)
    }

    /// Next status after `transition`, or a conflict naming the current
    /// status when the transition is not legal from here.
    pub fn apply(self, transition: LoanTransition) -> AppResult<LoanStatus> {
        if transition.sources().contains(&self) {
            Ok(transition.target())
        } else {
            Err(AppError::Conflict(format!(
                "Cannot {} a loan with status {}",
                transition.verb(),
                self
            )))
        }
    }

    /// Items can only be swapped before an admin has decided
    pub fn ensure_items_editable(self) -> AppResult<()> {
        if self == LoanStatus::Requested {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "Cannot edit items of a loan with status {}",
                self
            )))
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REQUESTED" => Ok(LoanStatus::Requested),
            "APPROVED" => Ok(LoanStatus::Approved),
            "REJECTED" => Ok(LoanStatus::Rejected),
            "RETURNED" => Ok(LoanStatus::Returned),
            "DONE" => Ok(LoanStatus::Done),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl_text_type!(LoanStatus);

/// Transitions applied to an existing loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanTransition {
    Approve,
    Reject,
    /// Borrower hands the units back
    Return,
    /// Staff confirms the return and closes the loan
    Complete,
}

impl LoanTransition {
    pub fn sources(&self) -> &'static [LoanStatus] {
        match self {
            LoanTransition::Approve | LoanTransition::Reject => &[LoanStatus::Requested],
            LoanTransition::Return => &[LoanStatus::Approved],
            LoanTransition::Complete => &[LoanStatus::Approved, LoanStatus::Returned],
        }
    }

    pub fn target(&self) -> LoanStatus {
        match self {
            LoanTransition::Approve => LoanStatus::Approved,
            LoanTransition::Reject => LoanStatus::Rejected,
            LoanTransition::Return => LoanStatus::Returned,
            LoanTransition::Complete => LoanStatus::Done,
        }
    }

    /// Roles allowed to trigger the transition. Return additionally requires
    /// the caller to own the loan unless they are staff.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            LoanTransition::Return => &[Role::Borrower, Role::Admin, Role::Superadmin],
            _ => ADMINS,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            LoanTransition::Approve => "approve",
            LoanTransition::Reject => "reject",
            LoanTransition::Return => "return",
            LoanTransition::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantRole {
    Owner,
    Invited,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Owner => "OWNER",
            ParticipantRole::Invited => "INVITED",
        }
    }
}

impl std::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OWNER" => Ok(ParticipantRole::Owner),
            "INVITED" => Ok(ParticipantRole::Invited),
            _ => Err(format!("Invalid participant role: {}", s)),
        }
    }
}

impl_text_type!(ParticipantRole);

/// A unit currently attached to a loan, as read under lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct HeldUnit {
    pub unit_id: Uuid,
    pub status: UnitStatus,
}

/// Status (and optionally condition) to write back for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitChange {
    pub unit_id: Uuid,
    pub status: UnitStatus,
    pub condition: Option<UnitCondition>,
}

/// Compute the unit writes that accompany `transition` from status `from`.
///
/// `conditions` maps unit ids to the condition reported on return; units
/// without an entry are treated as GOOD. Keys that are not units of this
/// loan are rejected.
pub fn plan_unit_changes(
    transition: LoanTransition,
    from: LoanStatus,
    units: &[HeldUnit],
    conditions: &HashMap<Uuid, UnitCondition>,
) -> AppResult<Vec<UnitChange>> {
    if let Some(stranger) = conditions
        .keys()
        .find(|id| !units.iter().any(|u| u.unit_id == **id))
    {
        return Err(AppError::BadRequest(format!(
            "Unit {} is not part of this loan",
            stranger
        )));
    }

    let damaged = |unit: &HeldUnit| conditions.get(&unit.unit_id) == Some(&UnitCondition::Damaged);

    let release = |unit: &HeldUnit| {
        if damaged(unit) {
            UnitChange {
                unit_id: unit.unit_id,
                status: UnitStatus::Maintenance,
                condition: Some(UnitCondition::Damaged),
            }
        } else {
            UnitChange {
                unit_id: unit.unit_id,
                status: UnitStatus::Available,
                condition: None,
            }
        }
    };

    let changes = match (transition, from) {
        (LoanTransition::Approve, _) => units
            .iter()
            .map(|u| UnitChange {
                unit_id: u.unit_id,
                status: UnitStatus::Loaned,
                condition: None,
            })
            .collect(),
        (LoanTransition::Reject, _) => units
            .iter()
            .map(|u| UnitChange {
                unit_id: u.unit_id,
                status: UnitStatus::Available,
                condition: None,
            })
            .collect(),
        (LoanTransition::Complete, LoanStatus::Returned) => units
            .iter()
            .filter(|u| damaged(*u) && u.status == UnitStatus::Available)
            .map(release)
            .collect(),
        (LoanTransition::Return, _) | (LoanTransition::Complete, _) => {
            units.iter().filter(|u| u.status.is_held()).map(release).collect()
        }
    };

    Ok(changes)
}

/// Loan record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub loan_id: Uuid,
    pub borrower_id: Uuid,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Loan item joined with its unit and product
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanItem {
    pub loan_item_id: Uuid,
    pub unit_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub serial_number: String,
    pub condition: UnitCondition,
    pub status: UnitStatus,
    /// Set once the loan no longer holds the unit
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanParticipant {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    pub role: ParticipantRole,
    pub created_at: DateTime<Utc>,
}

/// Assignment report filed on return
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Report {
    pub report_id: Uuid,
    pub loan_id: Uuid,
    pub spt_number: String,
    pub destination: String,
    pub place_of_execution: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportPayload {
    #[validate(length(min = 1, max = 100, message = "SPT number is required"))]
    pub spt_number: String,
    #[validate(length(min = 1, max = 200, message = "Destination is required"))]
    pub destination: String,
    #[validate(length(min = 1, max = 200, message = "Place of execution is required"))]
    pub place_of_execution: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

impl ReportPayload {
    pub fn check_dates(&self) -> AppResult<()> {
        if self.end_date < self.start_date {
            return Err(AppError::Validation(
                "end_date: must not be before start_date".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full loan view
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub borrower: UserShort,
    pub items: Vec<LoanItem>,
    pub participants: Vec<LoanParticipant>,
    pub report: Option<Report>,
}

/// Loan seen from one participant
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoanHistoryEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub loan: Loan,
    pub user_role: ParticipantRole,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoanItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 50, message = "Quantity must be between 1 and 50"))]
    pub quantity: i64,
}

/// Loan request. Units are either named directly or resolved per product.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[serde(default)]
    pub unit_ids: Vec<Uuid>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<LoanItemRequest>,
    #[serde(default)]
    pub invited_user_ids: Vec<Uuid>,
}

impl CreateLoan {
    pub fn check_not_empty(&self) -> AppResult<()> {
        if self.unit_ids.is_empty() && self.items.is_empty() {
            return Err(AppError::Validation(
                "unit_ids: at least one unit or item is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replacement item list for a REQUESTED loan
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLoanItems {
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<LoanItemRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ReturnLoan {
    #[validate(nested)]
    pub report: Option<ReportPayload>,
    /// Condition per unit; omitted units are GOOD
    #[serde(default)]
    pub unit_conditions: HashMap<Uuid, UnitCondition>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CompleteLoan {
    #[serde(default)]
    pub unit_conditions: HashMap<Uuid, UnitCondition>,
}

/// Borrowing eligibility
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanCheck {
    pub can_borrow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_loan_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LoanStatus; 5] = [
        LoanStatus::Requested,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::Returned,
        LoanStatus::Done,
    ];

    fn held(status: UnitStatus) -> HeldUnit {
        HeldUnit { unit_id: Uuid::new_v4(), status }
    }

    #[test]
    fn test_approve_and_reject_only_from_requested() {
        for status in ALL {
            for transition in [LoanTransition::Approve, LoanTransition::Reject] {
                let result = status.apply(transition);
                if status == LoanStatus::Requested {
                    assert_eq!(result.unwrap(), transition.target());
                } else {
                    assert!(matches!(result, Err(AppError::Conflict(_))));
                }
            }
        }
    }

    #[test]
    fn test_return_only_from_approved() {
        for status in ALL {
            let result = status.apply(LoanTransition::Return);
            if status == LoanStatus::Approved {
                assert_eq!(result.unwrap(), LoanStatus::Returned);
            } else {
                assert!(matches!(result, Err(AppError::Conflict(_))));
            }
        }
    }

    #[test]
    fn test_complete_from_approved_or_returned() {
        assert_eq!(LoanStatus::Approved.apply(LoanTransition::Complete).unwrap(), LoanStatus::Done);
        assert_eq!(LoanStatus::Returned.apply(LoanTransition::Complete).unwrap(), LoanStatus::Done);
        // a second completion is refused
        assert!(LoanStatus::Done.apply(LoanTransition::Complete).is_err());
        assert!(LoanStatus::Requested.apply(LoanTransition::Complete).is_err());
        assert!(LoanStatus::Rejected.apply(LoanTransition::Complete).is_err());
    }

    #[test]
    fn test_conflict_names_current_status() {
        match LoanStatus::Rejected.apply(LoanTransition::Approve) {
            Err(AppError::Conflict(msg)) => {
                assert_eq!(msg, "Cannot approve a loan with status REJECTED")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_only_requested_loans_have_editable_items() {
        for status in ALL {
            let result = status.ensure_items_editable();
            if status == LoanStatus::Requested {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(AppError::Conflict(_))));
            }
        }
    }

    #[test]
    fn test_update_items_requires_valid_items() {
        let empty = UpdateLoanItems { items: vec![] };
        assert!(empty.validate().is_err());

        let zero = UpdateLoanItems {
            items: vec![LoanItemRequest { product_id: Uuid::new_v4(), quantity: 0 }],
        };
        assert!(zero.validate().is_err());

        let ok = UpdateLoanItems {
            items: vec![LoanItemRequest { product_id: Uuid::new_v4(), quantity: 2 }],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_active_and_terminal() {
        assert!(LoanStatus::Requested.is_active());
        assert!(LoanStatus::Approved.is_active());
        assert!(!LoanStatus::Returned.is_active());
        assert!(LoanStatus::Rejected.is_terminal());
        assert!(LoanStatus::Done.is_terminal());
        assert!(!LoanStatus::Returned.is_terminal());
    }

    #[test]
    fn test_transition_roles() {
        assert_eq!(LoanTransition::Approve.allowed_roles(), ADMINS);
        assert_eq!(LoanTransition::Complete.allowed_roles(), ADMINS);
        assert!(LoanTransition::Return.allowed_roles().contains(&Role::Borrower));
    }

    #[test]
    fn test_approve_loans_all_units() {
        let units = vec![held(UnitStatus::Reserved), held(UnitStatus::Reserved)];
        let changes = plan_unit_changes(
            LoanTransition::Approve,
            LoanStatus::Requested,
            &units,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.status == UnitStatus::Loaned));
    }

    #[test]
    fn test_reject_frees_units() {
        let units = vec![held(UnitStatus::Reserved)];
        let changes = plan_unit_changes(
            LoanTransition::Reject,
            LoanStatus::Requested,
            &units,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(changes[0].status, UnitStatus::Available);
        assert_eq!(changes[0].condition, None);
    }

    #[test]
    fn test_return_routes_damaged_units_to_maintenance() {
        let good = held(UnitStatus::Loaned);
        let broken = held(UnitStatus::Loaned);
        let conditions = HashMap::from([
            (broken.unit_id, UnitCondition::Damaged),
            (good.unit_id, UnitCondition::Good),
        ]);

        let changes = plan_unit_changes(
            LoanTransition::Return,
            LoanStatus::Approved,
            &[good, broken],
            &conditions,
        )
        .unwrap();

        let of = |id: Uuid| changes.iter().find(|c| c.unit_id == id).copied().unwrap();
        assert_eq!(of(good.unit_id).status, UnitStatus::Available);
        assert_eq!(of(broken.unit_id).status, UnitStatus::Maintenance);
        assert_eq!(of(broken.unit_id).condition, Some(UnitCondition::Damaged));
    }

    #[test]
    fn test_round_trip_restores_every_unit() {
        let units: Vec<HeldUnit> = (0..3).map(|_| held(UnitStatus::Reserved)).collect();
        let none = HashMap::new();

        let approved = LoanStatus::Requested.apply(LoanTransition::Approve).unwrap();
        let loaned: Vec<HeldUnit> =
            plan_unit_changes(LoanTransition::Approve, LoanStatus::Requested, &units, &none)
                .unwrap()
                .into_iter()
                .map(|c| HeldUnit { unit_id: c.unit_id, status: c.status })
                .collect();

        let returned = approved.apply(LoanTransition::Return).unwrap();
        let changes = plan_unit_changes(LoanTransition::Return, approved, &loaned, &none).unwrap();

        assert_eq!(returned, LoanStatus::Returned);
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.status == UnitStatus::Available));
    }

    #[test]
    fn test_complete_after_return_only_touches_damaged_available_units() {
        let fine = held(UnitStatus::Available);
        let broken = held(UnitStatus::Available);
        let retired = held(UnitStatus::Retired);
        let conditions = HashMap::from([
            (broken.unit_id, UnitCondition::Damaged),
            (retired.unit_id, UnitCondition::Damaged),
        ]);

        let changes = plan_unit_changes(
            LoanTransition::Complete,
            LoanStatus::Returned,
            &[fine, broken, retired],
            &conditions,
        )
        .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].unit_id, broken.unit_id);
        assert_eq!(changes[0].status, UnitStatus::Maintenance);
    }

    #[test]
    fn test_complete_from_approved_releases_units() {
        let units = vec![held(UnitStatus::Loaned)];
        let changes = plan_unit_changes(
            LoanTransition::Complete,
            LoanStatus::Approved,
            &units,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(changes[0].status, UnitStatus::Available);
    }

    #[test]
    fn test_foreign_unit_condition_is_rejected() {
        let units = vec![held(UnitStatus::Loaned)];
        let conditions = HashMap::from([(Uuid::new_v4(), UnitCondition::Damaged)]);
        let result =
            plan_unit_changes(LoanTransition::Return, LoanStatus::Approved, &units, &conditions);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_create_loan_requires_units_or_items() {
        assert!(CreateLoan::default().check_not_empty().is_err());

        let payload: CreateLoan = serde_json::from_str(
            r#"{"items":[{"product_id":"7f1c2d3e-0000-4000-8000-000000000001","quantity":0}]}"#,
        )
        .unwrap();
        assert!(payload.check_not_empty().is_ok());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_report_dates() {
        let report = ReportPayload {
            spt_number: "SPT-01".to_string(),
            destination: "Bandung".to_string(),
            place_of_execution: "Gedung Sate".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            notes: None,
        };
        assert!(report.check_dates().is_err());

        let report = ReportPayload {
            end_date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            ..report
        };
        assert!(report.check_dates().is_ok());
    }

    #[test]
    fn test_return_body_parses_conditions() {
        let id = Uuid::new_v4();
        let body = format!(r#"{{"unit_conditions":{{"{}":"DAMAGED"}}}}"#, id);
        let payload: ReturnLoan = serde_json::from_str(&body).unwrap();
        assert_eq!(payload.unit_conditions.get(&id), Some(&UnitCondition::Damaged));
        assert!(payload.report.is_none());
    }
}

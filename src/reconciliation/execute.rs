use super::plan::{build_day_plan, DayPlan, ExistingDay, PlanError};
use crate::db::{optional, Database};
use crate::itinerary::{load_trip_days, TripDay};
use crate::utils::{generate_id, now_iso, short_id};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Trip {0} not found")]
    TripNotFound(String),

    #[error("Trip {0} must have plannedDate and plannedDuration")]
    MissingPlanFields(String),

    #[error("Plan error: {0}")]
    PlanError(#[from] PlanError),
}

/// Result of reconciling a trip's days
#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    /// All days of the trip after reconciliation, by day number
    pub days: Vec<TripDay>,
    pub deleted: usize,
    pub updated: usize,
    pub created: usize,
}

impl ReconciliationResult {
    pub fn writes(&self) -> usize {
        self.deleted + self.updated + self.created
    }
}

/// Make the stored days of a trip match its planned date and duration.
///
/// Runs as one `IMMEDIATE` transaction: the write lock is taken before the
/// days are read, so two reconciliations of the same trip cannot both act on
/// the same snapshot. Any failure rolls back every change.
pub async fn reconcile_trip_days(
    db: &Database,
    trip_id: &str,
) -> Result<ReconciliationResult, ReconcileError> {
    let mut conn = db.lock().await;
    let result = reconcile_in(&mut conn, trip_id)?;

    info!(
        trip_id = %short_id(trip_id),
        days = result.days.len(),
        deleted = result.deleted,
        updated = result.updated,
        created = result.created,
        "Reconciled trip days"
    );

    Ok(result)
}

fn reconcile_in(
    conn: &mut Connection,
    trip_id: &str,
) -> Result<ReconciliationResult, ReconcileError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let plan_fields: Option<(Option<DateTime<Utc>>, Option<u32>)> = optional(tx.query_row(
        "SELECT planned_date, planned_duration FROM trips WHERE id = ?1",
        [trip_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ))?;

    let (start, duration) = match plan_fields {
        None => return Err(ReconcileError::TripNotFound(trip_id.to_string())),
        Some((Some(planned_date), Some(duration))) if duration > 0 => {
            (planned_date.date_naive(), duration)
        }
        Some(_) => return Err(ReconcileError::MissingPlanFields(trip_id.to_string())),
    };

    let existing: Vec<ExistingDay> = load_trip_days(&tx, trip_id)?
        .into_iter()
        .map(|d| ExistingDay {
            id: d.id,
            day_number: d.day_number,
            date: d.date,
        })
        .collect();

    let plan = build_day_plan(start, duration, &existing)?;
    debug!(
        trip_id = %short_id(trip_id),
        existing = existing.len(),
        duration,
        unchanged = plan.unchanged,
        "Built day plan"
    );

    apply_plan(&tx, trip_id, &plan)?;
    let days = load_trip_days(&tx, trip_id)?;
    tx.commit()?;

    Ok(ReconciliationResult {
        days,
        deleted: plan.to_delete.len(),
        updated: plan.to_update.len(),
        created: plan.to_create.len(),
    })
}

/// Apply a plan inside an open transaction: deletes, then updates in
/// ascending order, then inserts.
fn apply_plan(tx: &Transaction, trip_id: &str, plan: &DayPlan) -> Result<(), ReconcileError> {
    if plan.is_noop() {
        return Ok(());
    }

    if !plan.to_delete.is_empty() {
        let ids = serde_json::to_string(&plan.to_delete)?;
        tx.execute(
            "DELETE FROM trip_days
             WHERE trip_id = ?1 AND id IN (SELECT value FROM json_each(?2))",
            params![trip_id, ids],
        )?;
    }

    if !plan.to_update.is_empty() {
        let mut stmt =
            tx.prepare("UPDATE trip_days SET day_number = ?2, date = ?3 WHERE id = ?1")?;
        for update in &plan.to_update {
            stmt.execute(params![update.id, update.day_number, update.date])?;
        }
    }

    if !plan.to_create.is_empty() {
        let now = now_iso();
        let mut stmt = tx.prepare(
            "INSERT INTO trip_days (id, trip_id, day_number, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for day in &plan.to_create {
            stmt.execute(params![generate_id(), trip_id, day.day_number, day.date, now])?;
        }
    }

    Ok(())
}

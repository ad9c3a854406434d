//! Trip-day reconciliation.
//!
//! `plan` computes, without touching storage, which day rows to delete,
//! renumber/re-date and create so a trip has exactly one day per planned
//! date. `execute` applies that plan atomically.

mod execute;
mod plan;

pub use execute::{reconcile_trip_days, ReconcileError, ReconciliationResult};
pub use plan::{
    build_day_plan, day_date, target_days, DayPlan, DayUpdate, ExistingDay, NewDay, PlanError,
};

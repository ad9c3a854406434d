use crate::utils::MAX_TRIP_DURATION_DAYS;
use chrono::{Days, NaiveDate};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PlanError {
    #[error("Day {day_number} of a trip starting {start} is outside the supported date range")]
    DateOutOfRange { start: NaiveDate, day_number: u32 },

    #[error("A trip of {0} days is too long to plan")]
    DurationTooLong(u32),
}

/// A stored day as seen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingDay {
    pub id: String,
    pub day_number: u32,
    pub date: NaiveDate,
}

/// A stored day that keeps its row but needs a new number and/or date
#[derive(Debug, Clone, PartialEq)]
pub struct DayUpdate {
    pub id: String,
    pub day_number: u32,
    pub date: NaiveDate,
}

/// A day that has to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewDay {
    pub day_number: u32,
    pub date: NaiveDate,
}

/// The three-way diff between the stored days of a trip and its plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayPlan {
    /// Ids of days past the planned duration
    pub to_delete: Vec<String>,

    /// Retained days whose number or date is wrong, in ascending day order
    pub to_update: Vec<DayUpdate>,

    /// Days missing at the end of the trip
    pub to_create: Vec<NewDay>,

    /// Retained days that are already correct
    pub unchanged: usize,
}

impl DayPlan {
    /// Check if applying the plan would write anything
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_update.is_empty() && self.to_create.is_empty()
    }
}

/// Date of a 1-indexed trip day
pub fn day_date(start: NaiveDate, day_number: u32) -> Result<NaiveDate, PlanError> {
    let offset = u64::from(day_number.saturating_sub(1));
    start
        .checked_add_days(Days::new(offset))
        .ok_or(PlanError::DateOutOfRange { start, day_number })
}

/// Every `(day_number, date)` pair a trip of `duration` days starting on
/// `start` must have.
pub fn target_days(start: NaiveDate, duration: u32) -> Result<Vec<(u32, NaiveDate)>, PlanError> {
    if duration > MAX_TRIP_DURATION_DAYS {
        return Err(PlanError::DurationTooLong(duration));
    }
    (1..=duration)
        .map(|n| day_date(start, n).map(|date| (n, date)))
        .collect()
}

/// Build the diff that turns `existing` into exactly `duration` days dated
/// consecutively from `start`.
///
/// Stored order is not trusted: days are ranked by day number, the first
/// `duration` are kept and renumbered by rank, the rest are deleted.
///
/// Updates come out in ascending order. Ranked numbers are distinct and
/// start at 1, so a kept day's new number never exceeds its old one; applying
/// the deletes first and then the updates in order never collides with the
/// per-trip day-number uniqueness constraint.
pub fn build_day_plan(
    start: NaiveDate,
    duration: u32,
    existing: &[ExistingDay],
) -> Result<DayPlan, PlanError> {
    if duration > MAX_TRIP_DURATION_DAYS {
        return Err(PlanError::DurationTooLong(duration));
    }

    let mut sorted: Vec<&ExistingDay> = existing.iter().collect();
    sorted.sort_by_key(|d| d.day_number);

    let keep = sorted.len().min(duration as usize);
    let mut plan = DayPlan {
        to_delete: sorted[keep..].iter().map(|d| d.id.clone()).collect(),
        ..Default::default()
    };

    for (position, day) in sorted[..keep].iter().enumerate() {
        let day_number = position as u32 + 1;
        let date = day_date(start, day_number)?;

        if day.day_number != day_number || day.date != date {
            plan.to_update.push(DayUpdate {
                id: day.id.clone(),
                day_number,
                date,
            });
        } else {
            plan.unchanged += 1;
        }
    }

    for day_number in (keep as u32 + 1)..=duration {
        plan.to_create.push(NewDay {
            day_number,
            date: day_date(start, day_number)?,
        });
    }

    Ok(plan)
}

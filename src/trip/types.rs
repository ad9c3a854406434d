use crate::utils::Patch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a user within a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Owner,
    Editor,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "OWNER",
            MemberRole::Editor => "EDITOR",
            MemberRole::Viewer => "VIEWER",
        }
    }

    /// Whether members with this role may change days, items and accommodations
    pub fn can_edit(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Editor)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(MemberRole::Owner),
            "EDITOR" => Ok(MemberRole::Editor),
            "VIEWER" => Ok(MemberRole::Viewer),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripMember {
    pub user_id: String,
    pub name: String,
    pub role: MemberRole,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub planned_date: Option<DateTime<Utc>>,
    pub planned_duration: Option<u32>,
    pub budget: Option<f64>,
    pub preferences: Vec<String>,
    pub members: Vec<TripMember>,
    pub created_at: String,
    pub updated_at: String,
}

/// Options for creating a trip
#[derive(Debug, Clone, Default)]
pub struct CreateTripOptions {
    pub name: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub planned_date: String,
    pub planned_duration: u32,
    pub budget: Option<f64>,
    pub preferences: Vec<String>,
    /// Accepted friends of the owner, added as viewers
    pub member_ids: Vec<String>,
}

/// Changes to a trip's basics. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateTripOptions {
    pub name: Option<String>,
    pub planned_date: Option<String>,
    pub planned_duration: Option<u32>,
    pub budget: Patch<f64>,
    pub preferences: Option<Vec<String>>,
}

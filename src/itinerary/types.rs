use crate::location::Location;
use crate::utils::Patch;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of an itinerary item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Activity,
    Food,
    Transport,
    Sightseeing,
    Shopping,
    #[default]
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Activity => "ACTIVITY",
            ItemType::Food => "FOOD",
            ItemType::Transport => "TRANSPORT",
            ItemType::Sightseeing => "SIGHTSEEING",
            ItemType::Shopping => "SHOPPING",
            ItemType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVITY" => Ok(ItemType::Activity),
            "FOOD" => Ok(ItemType::Food),
            "TRANSPORT" => Ok(ItemType::Transport),
            "SIGHTSEEING" => Ok(ItemType::Sightseeing),
            "SHOPPING" => Ok(ItemType::Shopping),
            "OTHER" => Ok(ItemType::Other),
            _ => Err(s.to_string()),
        }
    }
}

/// One calendar day of a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDay {
    pub id: String,
    pub trip_id: String,
    /// 1-indexed, contiguous within a trip
    pub day_number: u32,
    pub date: NaiveDate,
}

/// A day together with its items, as listed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayItinerary {
    #[serde(flatten)]
    pub day: TripDay,
    pub items: Vec<ItineraryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryItem {
    pub id: String,
    pub day_id: String,
    pub name: String,
    pub item_type: ItemType,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cost_estimate: Option<f64>,
    pub location: Option<Location>,
}

/// Input for a new itinerary item
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub name: String,
    pub item_type: ItemType,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cost_estimate: Option<f64>,
    pub location_id: Option<String>,
}

/// Partial update of an itinerary item. Required fields use `Option`
/// (None = keep); nullable fields use `Patch`.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub item_type: Option<ItemType>,
    pub description: Patch<String>,
    pub start_time: Patch<DateTime<Utc>>,
    pub end_time: Patch<DateTime<Utc>>,
    pub cost_estimate: Patch<f64>,
    pub location_id: Patch<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.item_type.is_none()
            && self.description.is_unchanged()
            && self.start_time.is_unchanged()
            && self.end_time.is_unchanged()
            && self.cost_estimate.is_unchanged()
            && self.location_id.is_unchanged()
    }
}

use crate::location::Location;
use crate::utils::Patch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccommodationType {
    Hotel,
    Hostel,
    Apartment,
    Guesthouse,
    Camping,
    #[default]
    Other,
}

impl AccommodationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationType::Hotel => "HOTEL",
            AccommodationType::Hostel => "HOSTEL",
            AccommodationType::Apartment => "APARTMENT",
            AccommodationType::Guesthouse => "GUESTHOUSE",
            AccommodationType::Camping => "CAMPING",
            AccommodationType::Other => "OTHER",
        }
    }
}

impl fmt::Display for AccommodationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccommodationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOTEL" => Ok(AccommodationType::Hotel),
            "HOSTEL" => Ok(AccommodationType::Hostel),
            "APARTMENT" => Ok(AccommodationType::Apartment),
            "GUESTHOUSE" => Ok(AccommodationType::Guesthouse),
            "CAMPING" => Ok(AccommodationType::Camping),
            "OTHER" => Ok(AccommodationType::Other),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub id: String,
    pub trip_id: String,
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub cost: Option<f64>,
    /// `None` once the location has been detached or deleted
    pub location: Option<Location>,
}

#[derive(Debug, Clone)]
pub struct NewAccommodation {
    pub name: String,
    pub accommodation_type: AccommodationType,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub cost: Option<f64>,
    pub location_id: String,
}

/// Partial update of an accommodation
#[derive(Debug, Clone, Default)]
pub struct AccommodationPatch {
    pub name: Option<String>,
    pub accommodation_type: Option<AccommodationType>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub cost: Patch<f64>,
    pub location_id: Patch<String>,
}

impl AccommodationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.accommodation_type.is_none()
            && self.check_in.is_none()
            && self.check_out.is_none()
            && self.cost.is_unchanged()
            && self.location_id.is_unchanged()
    }
}

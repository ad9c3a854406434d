//! Lodging attached to a trip. Every mutation of an existing row first
//! checks the row belongs to the trip the caller named.

mod crud;
mod types;

pub use crud::{
    add_accommodations, assert_accommodation_belongs_to_trip, delete_accommodation,
    list_accommodations, update_accommodation, AccommodationError, DeleteAccommodationResult,
};
pub use types::{Accommodation, AccommodationPatch, AccommodationType, NewAccommodation};

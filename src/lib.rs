pub mod accommodation;
pub mod config;
pub mod db;
pub mod itinerary;
pub mod location;
pub mod notification;
pub mod reconciliation;
pub mod server;
pub mod trip;
pub mod user;
pub mod utils;

// Re-export commonly used types
pub use accommodation::{
    add_accommodations, delete_accommodation, list_accommodations, update_accommodation,
    Accommodation, AccommodationError, AccommodationPatch, AccommodationType, NewAccommodation,
};
pub use config::{ConfigOverrides, DaemonConfig, FileConfig};
pub use db::{Database, DatabaseError};
pub use itinerary::{
    add_items, delete_item, list_days, update_item, DayItinerary, ItemPatch, ItemType,
    ItineraryError, ItineraryItem, NewItem, TripDay,
};
pub use location::{create_location, search_locations, Location, LocationError};
pub use notification::{ConnectionRegistry, Notification, NotificationError, Notifier};
pub use reconciliation::{build_day_plan, reconcile_trip_days, DayPlan, ReconcileError, ReconciliationResult};
pub use server::WayfarerService;
pub use trip::{
    create_trip, delete_trip, get_trip, list_trips, update_basics, CreateTripOptions, MemberRole,
    Trip, TripError, TripMember, UpdateTripOptions,
};
pub use user::{AuthResult, SessionKeys, User, UserError};
pub use utils::Patch;

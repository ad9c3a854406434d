mod crud;
mod types;

pub use crud::{
    add_items, add_trip_items, assert_item_belongs_to_trip, delete_item, delete_trip_item,
    get_item, list_days, update_item, update_trip_item, DeleteItemResult, ItineraryError,
};
pub(crate) use crud::load_trip_days;
pub use types::{DayItinerary, ItemPatch, ItemType, ItineraryItem, NewItem, TripDay};

mod crud;
mod members;
mod types;

pub use crud::{
    assert_user_can_edit_trip, assert_user_can_view_trip, assert_user_is_trip_owner, create_trip,
    delete_trip, get_trip, list_trips, update_basics, DeleteTripResult, TripError,
};
pub use members::{add_members, remove_member, update_member_role, MemberError};
pub use types::{CreateTripOptions, MemberRole, Trip, TripMember, UpdateTripOptions};

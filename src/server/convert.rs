//! Conversions between domain types and generated protobuf types, and from
//! domain errors to gRPC status codes.

use super::proto;
use crate::accommodation::{self, AccommodationError};
use crate::itinerary::{self, ItineraryError};
use crate::location::{self, LocationError};
use crate::notification::{self, NotificationError};
use crate::reconciliation::ReconcileError;
use crate::trip::{self, MemberError, TripError};
use crate::user::{self, FriendError, UserError};
use crate::utils::parse_timestamp;
use chrono::{DateTime, Utc};
use tonic::{Code, Status};

/// Turn a failure into the `error` field of a mutation response.
///
/// Storage failures stay gRPC errors; everything the caller can act on is
/// reported inside the envelope.
pub(super) fn envelope_error(status: Status) -> Result<String, Status> {
    match status.code() {
        Code::Internal => Err(status),
        _ => Ok(status.message().to_string()),
    }
}

pub(super) fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, Status> {
    parse_timestamp(value)
        .ok_or_else(|| Status::invalid_argument(format!("Invalid {field}: {value}")))
}

/// Parse an optional wire timestamp where an empty string means "not set"
pub(super) fn parse_optional_time(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, Status> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_time(field, &v).map(Some),
        _ => Ok(None),
    }
}

pub(super) fn parse_item_type(value: &str) -> Result<itinerary::ItemType, ItineraryError> {
    if value.trim().is_empty() {
        return Ok(itinerary::ItemType::default());
    }
    value.parse().map_err(ItineraryError::InvalidItemType)
}

pub(super) fn parse_accommodation_type(
    value: &str,
) -> Result<accommodation::AccommodationType, Status> {
    if value.trim().is_empty() {
        return Ok(accommodation::AccommodationType::default());
    }
    value
        .parse()
        .map_err(|v| Status::invalid_argument(format!("Invalid accommodation type: {v}")))
}

// ============ Domain -> proto ============

pub(super) fn user_to_proto(user: &user::User) -> proto::User {
    proto::User {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        created_at: user.created_at.clone(),
        updated_at: user.updated_at.clone(),
    }
}

pub(super) fn friendship_to_proto(friendship: &user::Friendship) -> proto::Friendship {
    proto::Friendship {
        user_id: friendship.user_id.clone(),
        friend_id: friendship.friend_id.clone(),
        status: friendship.status.to_string(),
        requested_by: friendship.requested_by.clone(),
        created_at: friendship.created_at.clone(),
        updated_at: friendship.updated_at.clone(),
    }
}

pub(super) fn location_to_proto(location: &location::Location) -> proto::Location {
    proto::Location {
        id: location.id.clone(),
        name: location.name.clone(),
        latitude: location.latitude,
        longitude: location.longitude,
        location_type: location.location_type.clone(),
    }
}

pub(super) fn member_to_proto(member: &trip::TripMember) -> proto::TripMember {
    proto::TripMember {
        user_id: member.user_id.clone(),
        name: member.name.clone(),
        role: member.role.to_string(),
        joined_at: member.joined_at.clone(),
    }
}

pub(super) fn trip_to_proto(trip: &trip::Trip) -> proto::Trip {
    proto::Trip {
        id: trip.id.clone(),
        owner_id: trip.owner_id.clone(),
        name: trip.name.clone(),
        planned_date: trip
            .planned_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        planned_duration: trip.planned_duration,
        budget: trip.budget,
        preferences: trip.preferences.clone(),
        members: trip.members.iter().map(member_to_proto).collect(),
        created_at: trip.created_at.clone(),
        updated_at: trip.updated_at.clone(),
    }
}

pub(super) fn item_to_proto(item: &itinerary::ItineraryItem) -> proto::ItineraryItem {
    proto::ItineraryItem {
        id: item.id.clone(),
        day_id: item.day_id.clone(),
        name: item.name.clone(),
        item_type: item.item_type.to_string(),
        description: item.description.clone(),
        start_time: item.start_time.map(|t| t.to_rfc3339()),
        end_time: item.end_time.map(|t| t.to_rfc3339()),
        cost_estimate: item.cost_estimate,
        location: item.location.as_ref().map(location_to_proto),
    }
}

pub(super) fn day_to_proto(
    day: &itinerary::TripDay,
    items: &[itinerary::ItineraryItem],
) -> proto::TripDay {
    proto::TripDay {
        id: day.id.clone(),
        trip_id: day.trip_id.clone(),
        day_number: day.day_number,
        date: day.date.format("%Y-%m-%d").to_string(),
        items: items.iter().map(item_to_proto).collect(),
    }
}

pub(super) fn accommodation_to_proto(acc: &accommodation::Accommodation) -> proto::Accommodation {
    proto::Accommodation {
        id: acc.id.clone(),
        trip_id: acc.trip_id.clone(),
        name: acc.name.clone(),
        accommodation_type: acc.accommodation_type.to_string(),
        check_in: acc.check_in.to_rfc3339(),
        check_out: acc.check_out.to_rfc3339(),
        cost: acc.cost,
        location: acc.location.as_ref().map(location_to_proto),
    }
}

pub(super) fn notification_to_proto(n: &notification::Notification) -> proto::Notification {
    proto::Notification {
        id: n.id.clone(),
        user_id: n.user_id.clone(),
        kind: n.kind.clone(),
        payload: n.payload.to_string(),
        read: n.read,
        created_at: n.created_at.clone(),
    }
}

// ============ Errors -> Status ============

impl From<ReconcileError> for Status {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::TripNotFound(_) => Status::not_found(err.to_string()),
            ReconcileError::MissingPlanFields(_) | ReconcileError::PlanError(_) => {
                Status::invalid_argument(err.to_string())
            }
            ReconcileError::DatabaseError(_) | ReconcileError::JsonError(_) => {
                Status::internal(err.to_string())
            }
        }
    }
}

impl From<ItineraryError> for Status {
    fn from(err: ItineraryError) -> Self {
        match err {
            ItineraryError::DatabaseError(_) => Status::internal(err.to_string()),
            ItineraryError::DayNotFound(_)
            | ItineraryError::ItemNotFound(_)
            | ItineraryError::LocationNotFound(_) => Status::not_found(err.to_string()),
            ItineraryError::DayNotInTrip { .. } | ItineraryError::ItemNotInTrip { .. } => {
                Status::failed_precondition(err.to_string())
            }
            ItineraryError::NameRequired
            | ItineraryError::InvalidItemType(_)
            | ItineraryError::InvalidTimeRange
            | ItineraryError::NegativeCost => Status::invalid_argument(err.to_string()),
        }
    }
}

impl From<AccommodationError> for Status {
    fn from(err: AccommodationError) -> Self {
        match err {
            AccommodationError::DatabaseError(_) => Status::internal(err.to_string()),
            AccommodationError::TripNotFound(_)
            | AccommodationError::AccommodationNotFound(_)
            | AccommodationError::LocationNotFound(_) => Status::not_found(err.to_string()),
            AccommodationError::NotInTrip { .. } => Status::failed_precondition(err.to_string()),
            AccommodationError::NameRequired
            | AccommodationError::InvalidStayRange
            | AccommodationError::NegativeCost => Status::invalid_argument(err.to_string()),
        }
    }
}

impl From<TripError> for Status {
    fn from(err: TripError) -> Self {
        match err {
            TripError::DatabaseError(_) | TripError::JsonError(_) => {
                Status::internal(err.to_string())
            }
            TripError::TripNotFound(_) => Status::not_found(err.to_string()),
            TripError::NotOwner(_) | TripError::NotMember(_) | TripError::ReadOnly(_) => {
                Status::permission_denied(err.to_string())
            }
            TripError::DateTaken => Status::already_exists(err.to_string()),
            TripError::NameRequired
            | TripError::InvalidDate(_)
            | TripError::DateInPast
            | TripError::InvalidDuration
            | TripError::NegativeBudget
            | TripError::NotFriends(_) => Status::invalid_argument(err.to_string()),
        }
    }
}

impl From<MemberError> for Status {
    fn from(err: MemberError) -> Self {
        match err {
            MemberError::TripError(e) => e.into(),
            MemberError::DatabaseError(_) => Status::internal(err.to_string()),
            MemberError::MemberNotFound(_) => Status::not_found(err.to_string()),
            MemberError::AlreadyMembers(_) => Status::already_exists(err.to_string()),
            MemberError::CannotRemoveOwner | MemberError::CannotChangeOwnerRole => {
                Status::failed_precondition(err.to_string())
            }
            MemberError::NoMembers | MemberError::NotFriends(_) | MemberError::InvalidRole(_) => {
                Status::invalid_argument(err.to_string())
            }
        }
    }
}

impl From<UserError> for Status {
    fn from(err: UserError) -> Self {
        match err {
            UserError::DatabaseError(_) | UserError::HashingFailed(_) => {
                Status::internal(err.to_string())
            }
            UserError::SessionError(_) | UserError::UserGone(_) | UserError::InvalidCredentials => {
                Status::unauthenticated(err.to_string())
            }
            UserError::UserNotFound(_) | UserError::PlaceNotListed(_) => {
                Status::not_found(err.to_string())
            }
            UserError::EmailTaken(_) | UserError::PlaceAlreadyListed(_) => {
                Status::already_exists(err.to_string())
            }
            UserError::InvalidEmail(_)
            | UserError::NameRequired
            | UserError::PasswordRequired
            | UserError::PlaceRequired => Status::invalid_argument(err.to_string()),
        }
    }
}

impl From<FriendError> for Status {
    fn from(err: FriendError) -> Self {
        match err {
            FriendError::DatabaseError(_) => Status::internal(err.to_string()),
            FriendError::SelfRequest => Status::invalid_argument(err.to_string()),
            FriendError::UserNotFound(_) | FriendError::RequestNotFound => {
                Status::not_found(err.to_string())
            }
            FriendError::AlreadyConnected(_) => Status::already_exists(err.to_string()),
            FriendError::NotRecipient => Status::permission_denied(err.to_string()),
        }
    }
}

impl From<LocationError> for Status {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::DatabaseError(_) => Status::internal(err.to_string()),
            LocationError::LocationNotFound(_) => Status::not_found(err.to_string()),
            LocationError::NameRequired | LocationError::InvalidCoordinates { .. } => {
                Status::invalid_argument(err.to_string())
            }
        }
    }
}

impl From<NotificationError> for Status {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::DatabaseError(_) | NotificationError::JsonError(_) => {
                Status::internal(err.to_string())
            }
            NotificationError::NotificationNotFound(_) => Status::not_found(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_keeps_client_errors() {
        let status: Status = ItineraryError::ItemNotInTrip {
            item_id: "i".to_string(),
            trip_id: "t".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::FailedPrecondition);
        assert_eq!(
            envelope_error(status).unwrap(),
            "Item does not belong to this trip"
        );
    }

    #[test]
    fn test_envelope_error_propagates_internal() {
        let status: Status = ItineraryError::DatabaseError(rusqlite::Error::InvalidQuery).into();
        assert!(envelope_error(status).is_err());
    }

    #[test]
    fn test_error_codes() {
        let status: Status = TripError::NotOwner("t".to_string()).into();
        assert_eq!(status.code(), Code::PermissionDenied);

        let status: Status = ReconcileError::MissingPlanFields("t".to_string()).into();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status: Status = MemberError::TripError(TripError::TripNotFound("t".to_string())).into();
        assert_eq!(status.code(), Code::NotFound);

        let status: Status = UserError::EmailTaken("a@b.c".to_string()).into();
        assert_eq!(status.code(), Code::AlreadyExists);
    }

    #[test]
    fn test_parse_item_type() {
        assert_eq!(parse_item_type("").unwrap(), itinerary::ItemType::Other);
        assert_eq!(parse_item_type("food").unwrap(), itinerary::ItemType::Food);
        assert!(matches!(
            parse_item_type("rocket"),
            Err(ItineraryError::InvalidItemType(_))
        ));
    }
}

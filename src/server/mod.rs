mod auth;
mod convert;

use crate::accommodation;
use crate::db::Database;
use crate::itinerary;
use crate::location;
use crate::notification::{self, ConnectionRegistry, Notifier};
use crate::reconciliation::reconcile_trip_days;
use crate::trip;
use crate::user::{self, bucket_list, friends, SessionKeys};
use crate::utils::Patch;
use convert::*;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

// Import generated protobuf types
pub mod proto {
    tonic::include_proto!("wayfarer");
}

use proto::wayfarer_server::Wayfarer;
use proto::*;

#[derive(Clone)]
pub struct WayfarerService {
    db: Database,
    keys: SessionKeys,
    notifier: Notifier,
}

impl WayfarerService {
    pub fn new(db: Database, keys: SessionKeys, registry: ConnectionRegistry) -> Self {
        let notifier = Notifier::new(db.clone(), registry);
        Self {
            db,
            keys,
            notifier,
        }
    }

    /// Resolve the caller from the request metadata
    async fn authenticate<T>(&self, request: &Request<T>) -> Result<user::User, Status> {
        let token = auth::session_token(request.metadata())
            .ok_or_else(|| Status::unauthenticated("Not authorized, no token"))?;
        user::authenticate(&self.db, &self.keys, &token)
            .await
            .map_err(Status::from)
    }

    /// Store and push a notification without blocking the response
    fn notify_async(&self, user_id: String, kind: &'static str, payload: serde_json::Value) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&user_id, kind, payload).await {
                warn!(user_id = %user_id, kind, error = %e, "Failed to send notification");
            }
        });
    }
}

type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<Notification, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl Wayfarer for WayfarerService {
    // ============ Accounts ============

    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();

        match user::register(&self.db, &self.keys, &req.name, &req.email, &req.password).await {
            Ok(result) => Ok(Response::new(AuthResponse {
                success: true,
                error: String::new(),
                user: Some(user_to_proto(&result.user)),
                token: result.token,
            })),
            Err(e) => Ok(Response::new(AuthResponse {
                success: false,
                error: envelope_error(e.into())?,
                user: None,
                token: String::new(),
            })),
        }
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();

        match user::login(&self.db, &self.keys, &req.email, &req.password).await {
            Ok(result) => Ok(Response::new(AuthResponse {
                success: true,
                error: String::new(),
                user: Some(user_to_proto(&result.user)),
                token: result.token,
            })),
            Err(e) => Ok(Response::new(AuthResponse {
                success: false,
                error: envelope_error(e.into())?,
                user: None,
                token: String::new(),
            })),
        }
    }

    async fn get_current_user(
        &self,
        request: Request<GetCurrentUserRequest>,
    ) -> Result<Response<User>, Status> {
        let user = self.authenticate(&request).await?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UpdateUserResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let options = user::UpdateUserOptions {
            name: req.name,
            email: req.email,
            password: req.password,
        };

        match user::update_details(&self.db, &caller.id, options).await {
            Ok(updated) => Ok(Response::new(UpdateUserResponse {
                success: true,
                error: String::new(),
                user: Some(user_to_proto(&updated)),
            })),
            Err(e) => Ok(Response::new(UpdateUserResponse {
                success: false,
                error: envelope_error(e.into())?,
                user: None,
            })),
        }
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;

        match user::delete_user(&self.db, &caller.id).await {
            Ok(()) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(e.into())?,
            })),
        }
    }

    async fn search_users(
        &self,
        request: Request<SearchUsersRequest>,
    ) -> Result<Response<SearchUsersResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let users = user::search_users_by_email(&self.db, &req.query, &caller.id).await?;
        Ok(Response::new(SearchUsersResponse {
            users: users.iter().map(user_to_proto).collect(),
        }))
    }

    // ============ Bucket list ============

    async fn add_bucket_list_place(
        &self,
        request: Request<BucketListPlaceRequest>,
    ) -> Result<Response<BucketListResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = match bucket_list::add(&self.db, &caller.id, &req.place).await {
            Ok(_) => bucket_list::list(&self.db, &caller.id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(places) => Ok(Response::new(BucketListResponse {
                success: true,
                error: String::new(),
                places,
            })),
            Err(e) => Ok(Response::new(BucketListResponse {
                success: false,
                error: envelope_error(e.into())?,
                places: vec![],
            })),
        }
    }

    async fn list_bucket_list(
        &self,
        request: Request<ListBucketListRequest>,
    ) -> Result<Response<BucketListResponse>, Status> {
        let caller = self.authenticate(&request).await?;

        let places = bucket_list::list(&self.db, &caller.id).await?;
        Ok(Response::new(BucketListResponse {
            success: true,
            error: String::new(),
            places,
        }))
    }

    async fn remove_bucket_list_place(
        &self,
        request: Request<BucketListPlaceRequest>,
    ) -> Result<Response<BucketListResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match bucket_list::remove(&self.db, &caller.id, &req.place).await {
            Ok(places) => Ok(Response::new(BucketListResponse {
                success: true,
                error: String::new(),
                places,
            })),
            Err(e) => Ok(Response::new(BucketListResponse {
                success: false,
                error: envelope_error(e.into())?,
                places: vec![],
            })),
        }
    }

    // ============ Friends ============

    async fn send_friend_request(
        &self,
        request: Request<FriendRequest>,
    ) -> Result<Response<FriendshipResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match friends::send_request(&self.db, &caller.id, &req.friend_id).await {
            Ok(friendship) => {
                self.notify_async(
                    req.friend_id.clone(),
                    notification::KIND_FRIEND_REQUEST,
                    serde_json::json!({
                        "fromUserId": caller.id,
                        "fromName": caller.name,
                    }),
                );
                Ok(Response::new(FriendshipResponse {
                    success: true,
                    error: String::new(),
                    friendship: Some(friendship_to_proto(&friendship)),
                }))
            }
            Err(e) => Ok(Response::new(FriendshipResponse {
                success: false,
                error: envelope_error(e.into())?,
                friendship: None,
            })),
        }
    }

    async fn accept_friend_request(
        &self,
        request: Request<FriendRequest>,
    ) -> Result<Response<FriendshipResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match friends::accept_request(&self.db, &caller.id, &req.friend_id).await {
            Ok(friendship) => {
                self.notify_async(
                    req.friend_id.clone(),
                    notification::KIND_FRIEND_ACCEPTED,
                    serde_json::json!({
                        "byUserId": caller.id,
                        "byName": caller.name,
                    }),
                );
                Ok(Response::new(FriendshipResponse {
                    success: true,
                    error: String::new(),
                    friendship: Some(friendship_to_proto(&friendship)),
                }))
            }
            Err(e) => Ok(Response::new(FriendshipResponse {
                success: false,
                error: envelope_error(e.into())?,
                friendship: None,
            })),
        }
    }

    async fn block_user(
        &self,
        request: Request<FriendRequest>,
    ) -> Result<Response<FriendshipResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match friends::block(&self.db, &caller.id, &req.friend_id).await {
            Ok(friendship) => Ok(Response::new(FriendshipResponse {
                success: true,
                error: String::new(),
                friendship: Some(friendship_to_proto(&friendship)),
            })),
            Err(e) => Ok(Response::new(FriendshipResponse {
                success: false,
                error: envelope_error(e.into())?,
                friendship: None,
            })),
        }
    }

    async fn list_friends(
        &self,
        request: Request<ListFriendsRequest>,
    ) -> Result<Response<ListFriendsResponse>, Status> {
        let caller = self.authenticate(&request).await?;

        let list = friends::list_friends(&self.db, &caller.id).await?;
        Ok(Response::new(ListFriendsResponse {
            friends: list.iter().map(user_to_proto).collect(),
        }))
    }

    // ============ Trips ============

    async fn create_trip(
        &self,
        request: Request<CreateTripRequest>,
    ) -> Result<Response<TripResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let options = trip::CreateTripOptions {
            name: req.name,
            planned_date: req.planned_date,
            planned_duration: req.planned_duration,
            budget: req.budget,
            preferences: req.preferences,
            member_ids: req.member_ids,
        };

        match trip::create_trip(&self.db, &caller.id, options).await {
            Ok(created) => {
                for member in created.members.iter().filter(|m| m.user_id != caller.id) {
                    self.notify_trip_invite(&caller, &created, &member.user_id);
                }
                info!(trip_id = %created.id, "Trip created");
                Ok(Response::new(TripResponse {
                    success: true,
                    error: String::new(),
                    trip: Some(trip_to_proto(&created)),
                }))
            }
            Err(e) => Ok(Response::new(TripResponse {
                success: false,
                error: envelope_error(e.into())?,
                trip: None,
            })),
        }
    }

    async fn get_trip(&self, request: Request<GetTripRequest>) -> Result<Response<Trip>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let found = trip::get_trip(&self.db, &caller.id, &req.trip_id).await?;
        Ok(Response::new(trip_to_proto(&found)))
    }

    async fn list_trips(
        &self,
        request: Request<ListTripsRequest>,
    ) -> Result<Response<ListTripsResponse>, Status> {
        let caller = self.authenticate(&request).await?;

        let trips = trip::list_trips(&self.db, &caller.id).await?;
        let total_count = trips.len() as i32;
        Ok(Response::new(ListTripsResponse {
            trips: trips.iter().map(trip_to_proto).collect(),
            total_count,
        }))
    }

    async fn update_trip(
        &self,
        request: Request<UpdateTripRequest>,
    ) -> Result<Response<TripResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let budget = if req.clear_budget {
            Patch::Clear
        } else {
            req.budget.map_or(Patch::Unchanged, Patch::Set)
        };
        let options = trip::UpdateTripOptions {
            name: req.name,
            planned_date: req.planned_date,
            planned_duration: req.planned_duration,
            budget,
            preferences: req.replace_preferences.then_some(req.preferences),
        };

        match trip::update_basics(&self.db, &req.trip_id, &caller.id, options).await {
            Ok(updated) => Ok(Response::new(TripResponse {
                success: true,
                error: String::new(),
                trip: Some(trip_to_proto(&updated)),
            })),
            Err(e) => Ok(Response::new(TripResponse {
                success: false,
                error: envelope_error(e.into())?,
                trip: None,
            })),
        }
    }

    async fn delete_trip(
        &self,
        request: Request<DeleteTripRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match trip::delete_trip(&self.db, &caller.id, &req.trip_id).await {
            Ok(_) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(e.into())?,
            })),
        }
    }

    // ============ Trip members ============

    async fn add_trip_members(
        &self,
        request: Request<AddTripMembersRequest>,
    ) -> Result<Response<TripResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = match trip::add_members(&self.db, &req.trip_id, &caller.id, req.member_ids)
            .await
        {
            Ok(added) => trip::get_trip(&self.db, &caller.id, &req.trip_id)
                .await
                .map(|t| (added, t))
                .map_err(trip::MemberError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok((added, updated)) => {
                for member in &added {
                    self.notify_trip_invite(&caller, &updated, &member.user_id);
                }
                Ok(Response::new(TripResponse {
                    success: true,
                    error: String::new(),
                    trip: Some(trip_to_proto(&updated)),
                }))
            }
            Err(e) => Ok(Response::new(TripResponse {
                success: false,
                error: envelope_error(e.into())?,
                trip: None,
            })),
        }
    }

    async fn remove_trip_member(
        &self,
        request: Request<RemoveTripMemberRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match trip::remove_member(&self.db, &caller.id, &req.trip_id, &req.member_id).await {
            Ok(()) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(e.into())?,
            })),
        }
    }

    async fn update_trip_member_role(
        &self,
        request: Request<UpdateTripMemberRoleRequest>,
    ) -> Result<Response<TripMemberResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match trip::update_member_role(&self.db, &req.trip_id, &caller.id, &req.member_id, &req.role)
            .await
        {
            Ok(member) => Ok(Response::new(TripMemberResponse {
                success: true,
                error: String::new(),
                member: Some(member_to_proto(&member)),
            })),
            Err(e) => Ok(Response::new(TripMemberResponse {
                success: false,
                error: envelope_error(e.into())?,
                member: None,
            })),
        }
    }

    // ============ Days & itinerary ============

    async fn sync_trip_days(
        &self,
        request: Request<SyncTripDaysRequest>,
    ) -> Result<Response<SyncTripDaysResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = match trip::assert_user_is_trip_owner(&self.db, &caller.id, &req.trip_id).await
        {
            Ok(()) => reconcile_trip_days(&self.db, &req.trip_id)
                .await
                .map_err(Status::from),
            Err(e) => Err(Status::from(e)),
        };

        match result {
            Ok(result) => Ok(Response::new(SyncTripDaysResponse {
                success: true,
                error: String::new(),
                days: result.days.iter().map(|d| day_to_proto(d, &[])).collect(),
                deleted: result.deleted as u32,
                updated: result.updated as u32,
                created: result.created as u32,
            })),
            Err(status) => Ok(Response::new(SyncTripDaysResponse {
                success: false,
                error: envelope_error(status)?,
                days: vec![],
                deleted: 0,
                updated: 0,
                created: 0,
            })),
        }
    }

    async fn list_trip_days(
        &self,
        request: Request<ListTripDaysRequest>,
    ) -> Result<Response<ListTripDaysResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        trip::assert_user_can_view_trip(&self.db, &caller.id, &req.trip_id).await?;
        let days = itinerary::list_days(&self.db, &req.trip_id).await?;
        Ok(Response::new(ListTripDaysResponse {
            days: days
                .iter()
                .map(|d| day_to_proto(&d.day, &d.items))
                .collect(),
        }))
    }

    async fn add_items(
        &self,
        request: Request<AddItemsRequest>,
    ) -> Result<Response<AddItemsResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = self.add_items_for(&caller.id, req).await;
        match result {
            Ok(items) => Ok(Response::new(AddItemsResponse {
                success: true,
                error: String::new(),
                items: items.iter().map(item_to_proto).collect(),
            })),
            Err(status) => Ok(Response::new(AddItemsResponse {
                success: false,
                error: envelope_error(status)?,
                items: vec![],
            })),
        }
    }

    async fn update_item(
        &self,
        request: Request<UpdateItemRequest>,
    ) -> Result<Response<ItemResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match self.update_item_for(&caller.id, req).await {
            Ok(item) => Ok(Response::new(ItemResponse {
                success: true,
                error: String::new(),
                item: Some(item_to_proto(&item)),
            })),
            Err(status) => Ok(Response::new(ItemResponse {
                success: false,
                error: envelope_error(status)?,
                item: None,
            })),
        }
    }

    async fn delete_item(
        &self,
        request: Request<DeleteItemRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = match trip::assert_user_can_edit_trip(&self.db, &caller.id, &req.trip_id).await
        {
            Ok(_) => itinerary::delete_trip_item(&self.db, &req.trip_id, &req.item_id)
                .await
                .map_err(Status::from),
            Err(e) => Err(Status::from(e)),
        };

        match result {
            Ok(_) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(status) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(status)?,
            })),
        }
    }

    // ============ Accommodations ============

    async fn add_accommodations(
        &self,
        request: Request<AddAccommodationsRequest>,
    ) -> Result<Response<AddAccommodationsResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match self.add_accommodations_for(&caller.id, req).await {
            Ok(created) => Ok(Response::new(AddAccommodationsResponse {
                success: true,
                error: String::new(),
                accommodations: created.iter().map(accommodation_to_proto).collect(),
            })),
            Err(status) => Ok(Response::new(AddAccommodationsResponse {
                success: false,
                error: envelope_error(status)?,
                accommodations: vec![],
            })),
        }
    }

    async fn list_accommodations(
        &self,
        request: Request<ListAccommodationsRequest>,
    ) -> Result<Response<ListAccommodationsResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        trip::assert_user_can_view_trip(&self.db, &caller.id, &req.trip_id).await?;
        let list = accommodation::list_accommodations(&self.db, &req.trip_id).await?;
        Ok(Response::new(ListAccommodationsResponse {
            accommodations: list.iter().map(accommodation_to_proto).collect(),
        }))
    }

    async fn update_accommodation(
        &self,
        request: Request<UpdateAccommodationRequest>,
    ) -> Result<Response<AccommodationResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match self.update_accommodation_for(&caller.id, req).await {
            Ok(updated) => Ok(Response::new(AccommodationResponse {
                success: true,
                error: String::new(),
                accommodation: Some(accommodation_to_proto(&updated)),
            })),
            Err(status) => Ok(Response::new(AccommodationResponse {
                success: false,
                error: envelope_error(status)?,
                accommodation: None,
            })),
        }
    }

    async fn delete_accommodation(
        &self,
        request: Request<DeleteAccommodationRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let result = match trip::assert_user_can_edit_trip(&self.db, &caller.id, &req.trip_id).await
        {
            Ok(_) => accommodation::delete_accommodation(
                &self.db,
                &req.accommodation_id,
                &req.trip_id,
            )
            .await
            .map_err(Status::from),
            Err(e) => Err(Status::from(e)),
        };

        match result {
            Ok(_) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(status) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(status)?,
            })),
        }
    }

    // ============ Locations ============

    async fn create_location(
        &self,
        request: Request<CreateLocationRequest>,
    ) -> Result<Response<LocationResponse>, Status> {
        self.authenticate(&request).await?;
        let req = request.into_inner();

        let options = location::CreateLocationOptions {
            name: req.name,
            latitude: req.latitude,
            longitude: req.longitude,
            location_type: req.location_type,
        };

        match location::create_location(&self.db, options).await {
            Ok(created) => Ok(Response::new(LocationResponse {
                success: true,
                error: String::new(),
                location: Some(location_to_proto(&created)),
            })),
            Err(e) => Ok(Response::new(LocationResponse {
                success: false,
                error: envelope_error(e.into())?,
                location: None,
            })),
        }
    }

    async fn get_location(
        &self,
        request: Request<GetLocationRequest>,
    ) -> Result<Response<Location>, Status> {
        self.authenticate(&request).await?;
        let req = request.into_inner();

        let found = location::get_location(&self.db, &req.location_id).await?;
        Ok(Response::new(location_to_proto(&found)))
    }

    async fn search_locations(
        &self,
        request: Request<SearchLocationsRequest>,
    ) -> Result<Response<SearchLocationsResponse>, Status> {
        self.authenticate(&request).await?;
        let req = request.into_inner();

        let found = location::search_locations(&self.db, &req.query).await?;
        Ok(Response::new(SearchLocationsResponse {
            locations: found.iter().map(location_to_proto).collect(),
        }))
    }

    // ============ Notifications ============

    async fn list_notifications(
        &self,
        request: Request<ListNotificationsRequest>,
    ) -> Result<Response<ListNotificationsResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        let options = notification::ListNotificationsOptions {
            kind: if req.kind.is_empty() { None } else { Some(req.kind) },
            read: req.read,
        };
        let list = notification::list_notifications(&self.db, &caller.id, options).await?;
        Ok(Response::new(ListNotificationsResponse {
            notifications: list.iter().map(notification_to_proto).collect(),
        }))
    }

    async fn mark_notification_read(
        &self,
        request: Request<MarkNotificationReadRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let caller = self.authenticate(&request).await?;
        let req = request.into_inner();

        match notification::mark_read(&self.db, &caller.id, &req.notification_id).await {
            Ok(_) => Ok(Response::new(DeleteResponse {
                success: true,
                error: String::new(),
            })),
            Err(e) => Ok(Response::new(DeleteResponse {
                success: false,
                error: envelope_error(e.into())?,
            })),
        }
    }

    type SubscribeStream = NotificationStream;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let caller = self.authenticate(&request).await?;

        let subscription = self.notifier.registry().register(&caller.id);
        let stream = subscription.map(|n| Ok(notification_to_proto(&n)));
        Ok(Response::new(Box::pin(stream) as Self::SubscribeStream))
    }
}

impl WayfarerService {
    fn notify_trip_invite(&self, caller: &user::User, trip: &trip::Trip, member_id: &str) {
        self.notify_async(
            member_id.to_string(),
            notification::KIND_TRIP_INVITE,
            serde_json::json!({
                "tripId": trip.id,
                "tripName": trip.name,
                "invitedBy": caller.id,
                "invitedByName": caller.name,
            }),
        );
    }

    async fn add_items_for(
        &self,
        user_id: &str,
        req: AddItemsRequest,
    ) -> Result<Vec<itinerary::ItineraryItem>, Status> {
        if req.items.is_empty() {
            return Err(Status::invalid_argument("Items array is required"));
        }
        trip::assert_user_can_edit_trip(&self.db, user_id, &req.trip_id).await?;

        let mut items = Vec::with_capacity(req.items.len());
        for item in req.items {
            items.push(itinerary::NewItem {
                name: item.name,
                item_type: parse_item_type(&item.item_type)?,
                description: item.description.filter(|d| !d.trim().is_empty()),
                start_time: parse_optional_time("start time", item.start_time)?,
                end_time: parse_optional_time("end time", item.end_time)?,
                cost_estimate: item.cost_estimate,
                location_id: item.location_id.filter(|id| !id.trim().is_empty()),
            });
        }

        Ok(itinerary::add_trip_items(&self.db, &req.trip_id, &req.day_id, items).await?)
    }

    async fn update_item_for(
        &self,
        user_id: &str,
        req: UpdateItemRequest,
    ) -> Result<itinerary::ItineraryItem, Status> {
        trip::assert_user_can_edit_trip(&self.db, user_id, &req.trip_id).await?;

        let cost_estimate = if req.clear_cost_estimate {
            Patch::Clear
        } else {
            req.cost_estimate.map_or(Patch::Unchanged, Patch::Set)
        };
        let patch = itinerary::ItemPatch {
            name: req.name,
            item_type: req.item_type.as_deref().map(parse_item_type).transpose()?,
            description: Patch::from_wire(req.description),
            start_time: Patch::from_wire(req.start_time)
                .try_map(|t| parse_time("start time", &t))?,
            end_time: Patch::from_wire(req.end_time).try_map(|t| parse_time("end time", &t))?,
            cost_estimate,
            location_id: Patch::from_wire(req.location_id),
        };

        Ok(itinerary::update_trip_item(&self.db, &req.trip_id, &req.item_id, patch).await?)
    }

    async fn add_accommodations_for(
        &self,
        user_id: &str,
        req: AddAccommodationsRequest,
    ) -> Result<Vec<accommodation::Accommodation>, Status> {
        trip::assert_user_can_edit_trip(&self.db, user_id, &req.trip_id).await?;

        let mut list = Vec::with_capacity(req.accommodations.len());
        for acc in req.accommodations {
            if acc.location_id.trim().is_empty() {
                return Err(Status::invalid_argument("Location is required"));
            }
            list.push(accommodation::NewAccommodation {
                name: acc.name,
                accommodation_type: parse_accommodation_type(&acc.accommodation_type)?,
                check_in: parse_time("check-in", &acc.check_in)?,
                check_out: parse_time("check-out", &acc.check_out)?,
                cost: acc.cost,
                location_id: acc.location_id,
            });
        }

        Ok(accommodation::add_accommodations(&self.db, &req.trip_id, list).await?)
    }

    async fn update_accommodation_for(
        &self,
        user_id: &str,
        req: UpdateAccommodationRequest,
    ) -> Result<accommodation::Accommodation, Status> {
        trip::assert_user_can_edit_trip(&self.db, user_id, &req.trip_id).await?;

        let cost = if req.clear_cost {
            Patch::Clear
        } else {
            req.cost.map_or(Patch::Unchanged, Patch::Set)
        };
        let patch = accommodation::AccommodationPatch {
            name: req.name,
            accommodation_type: req
                .accommodation_type
                .as_deref()
                .map(parse_accommodation_type)
                .transpose()?,
            check_in: req
                .check_in
                .as_deref()
                .map(|t| parse_time("check-in", t))
                .transpose()?,
            check_out: req
                .check_out
                .as_deref()
                .map(|t| parse_time("check-out", t))
                .transpose()?,
            cost,
            location_id: Patch::from_wire(req.location_id),
        };

        Ok(
            accommodation::update_accommodation(&self.db, &req.accommodation_id, &req.trip_id, patch)
                .await?,
        )
    }
}

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog;
use crate::dispatch;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver::{self, ApprovalState};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserInfo;
use crate::handlers::user::{BookingResponse, CancelBookingRequest};
use crate::lifecycle;
use crate::notify::Event;
use crate::store;
use crate::utils::geo::haversine_distance;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct DriverResponse {
    pub driver: driver::Model,
}

/// A booking enriched with the rider's contact details, for driver views.
#[derive(Debug, Serialize)]
pub struct BookingWithUser {
    #[serde(flatten)]
    pub booking: booking::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Serialize)]
pub struct DriverBookingListResponse {
    pub bookings: Vec<BookingWithUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverResponse>> {
    let driver = dispatch::driver_for_user(&state.db, claims.sub).await?;
    Ok(Json(DriverResponse { driver }))
}

/// Toggle availability. Turning available re-evaluates every booking still
/// waiting for a broadcast, so riders who requested before any matching
/// driver was online get picked up.
pub async fn set_availability(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AvailabilityRequest>,
) -> AppResult<Json<DriverResponse>> {
    let drv = dispatch::driver_for_user(&state.db, claims.sub).await?;

    if payload.is_available && drv.approval_state != ApprovalState::Approved {
        return Err(AppError::NotEligible(
            "Only approved drivers can go online".to_string(),
        ));
    }

    let turning_on = payload.is_available && !drv.is_available;
    let mut patch: driver::ActiveModel = drv.into();
    patch.is_available = Set(payload.is_available);
    let driver = patch.update(&state.db).await?;

    if turning_on {
        let sent = dispatch::rebroadcast_pending(&state.db, &state.notifier).await?;
        if sent > 0 {
            tracing::info!(driver_id = %driver.id, rebroadcast = sent, "pending bookings broadcast");
        }
    }

    Ok(Json(DriverResponse { driver }))
}

/// Broadcast bookings this driver can accept. Offline or unapproved drivers
/// see an empty list rather than an error, matching the polling client.
pub async fn new_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverBookingListResponse>> {
    let drv = dispatch::driver_for_user(&state.db, claims.sub).await?;

    if drv.approval_state != ApprovalState::Approved || !drv.is_available {
        return Ok(Json(DriverBookingListResponse {
            bookings: vec![],
            message: Some("You are currently offline".to_string()),
        }));
    }

    let bookings = store::broadcasted_for_driver(&state.db, &drv).await?;
    Ok(Json(DriverBookingListResponse {
        bookings: with_users(&state, bookings).await?,
        message: None,
    }))
}

/// Accept a broadcast booking. Concurrent accepts race on the store's
/// compare-and-set; exactly one driver wins and the rest get a conflict.
pub async fn accept_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let drv = dispatch::driver_for_user(&state.db, claims.sub).await?;

    if drv.approval_state != ApprovalState::Approved {
        return Err(AppError::NotEligible("Driver is not approved".to_string()));
    }
    if !drv.is_available {
        return Err(AppError::NotEligible(
            "Go online before accepting bookings".to_string(),
        ));
    }

    let b = store::read(&state.db, id).await?;
    if !drv.drives(&b.vehicle_type) {
        return Err(AppError::NotEligible(format!(
            "You do not drive a {}",
            b.vehicle_type
        )));
    }
    if b.status != BookingStatus::Broadcasted {
        return Err(AppError::StateConflict(
            "Booking is no longer available".to_string(),
        ));
    }

    let patch = booking::ActiveModel {
        driver_id: Set(Some(drv.id)),
        ..Default::default()
    };
    let updated = store::transition(
        &state.db,
        b.id,
        BookingStatus::Broadcasted,
        BookingStatus::Accepted,
        claims.sub,
        patch,
    )
    .await?;

    state.notifier.publish(
        UserRole::User,
        updated.user_id,
        Event::booking_accepted(updated.user_id, &updated),
    );

    Ok(Json(BookingResponse { booking: updated }))
}

pub async fn accepted_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverBookingListResponse>> {
    let drv = dispatch::driver_for_user(&state.db, claims.sub).await?;
    let bookings = store::for_driver(
        &state.db,
        drv.id,
        &[BookingStatus::Accepted, BookingStatus::InProgress],
    )
    .await?;
    Ok(Json(DriverBookingListResponse {
        bookings: with_users(&state, bookings).await?,
        message: None,
    }))
}

pub async fn start_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let (drv, b) = assigned_booking(&state, claims.sub, id).await?;

    let updated = store::transition(
        &state.db,
        b.id,
        b.status,
        BookingStatus::InProgress,
        drv.id,
        <booking::ActiveModel as Default>::default(),
    )
    .await?;

    state.notifier.publish(
        UserRole::User,
        updated.user_id,
        Event::trip_started(updated.user_id, &updated),
    );

    Ok(Json(BookingResponse { booking: updated }))
}

/// Complete an in-progress trip. The fare is computed here, exactly once:
/// vehicle base price plus the per-kilometre rate over the pickup-to-drop
/// haversine distance. The driver's trip counter moves only if the
/// transition wins.
pub async fn complete_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let (drv, b) = assigned_booking(&state, claims.sub, id).await?;

    let vehicle = catalog::find(&b.vehicle_type).ok_or_else(|| {
        AppError::Internal(format!("Vehicle type {} missing from catalog", b.vehicle_type))
    })?;
    let distance = haversine_distance(b.pickup_lat, b.pickup_lng, b.drop_lat, b.drop_lng);
    let fare = catalog::fare(vehicle, distance);

    let patch = booking::ActiveModel {
        fare: Set(Some(fare)),
        ..Default::default()
    };
    let updated =
        store::transition(&state.db, b.id, b.status, BookingStatus::Completed, drv.id, patch)
            .await?;

    let total_trips = drv.total_trips;
    let mut counter: driver::ActiveModel = drv.into();
    counter.total_trips = Set(total_trips + 1);
    counter.update(&state.db).await?;

    state.notifier.publish(
        UserRole::User,
        updated.user_id,
        Event::trip_completed(updated.user_id, &updated),
    );

    tracing::info!(booking_id = %updated.id, fare, "trip completed");
    Ok(Json(BookingResponse { booking: updated }))
}

/// Cancel an accepted booking before the trip starts. The rider is notified
/// and the booking terminates; it does not return to the broadcast pool.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    let (drv, b) = assigned_booking(&state, claims.sub, id).await?;

    if !lifecycle::may_cancel(UserRole::Driver, b.status) {
        return Err(AppError::InvalidTransition {
            from: b.status.as_str().to_string(),
            to: BookingStatus::Cancelled.as_str().to_string(),
        });
    }

    let patch = booking::ActiveModel {
        cancel_reason: Set(payload.reason),
        cancelled_by: Set(Some("driver".to_string())),
        ..Default::default()
    };
    let updated =
        store::transition(&state.db, b.id, b.status, BookingStatus::Cancelled, drv.id, patch)
            .await?;

    state.notifier.publish(
        UserRole::User,
        updated.user_id,
        Event::booking_cancelled(updated.user_id, &updated, "driver"),
    );

    Ok(Json(BookingResponse { booking: updated }))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverBookingListResponse>> {
    let drv = dispatch::driver_for_user(&state.db, claims.sub).await?;
    let bookings = store::for_driver(&state.db, drv.id, &[BookingStatus::Completed]).await?;
    Ok(Json(DriverBookingListResponse {
        bookings: with_users(&state, bookings).await?,
        message: None,
    }))
}

async fn assigned_booking(
    state: &AppState,
    user_id: Uuid,
    booking_id: Uuid,
) -> AppResult<(driver::Model, booking::Model)> {
    let drv = dispatch::driver_for_user(&state.db, user_id).await?;
    let b = store::read(&state.db, booking_id).await?;
    if b.driver_id != Some(drv.id) {
        return Err(AppError::Forbidden(
            "You are not assigned to this booking".to_string(),
        ));
    }
    Ok((drv, b))
}

async fn with_users(
    state: &AppState,
    bookings: Vec<booking::Model>,
) -> AppResult<Vec<BookingWithUser>> {
    let user_ids: Vec<Uuid> = bookings.iter().map(|b| b.user_id).collect();
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?;

    Ok(bookings
        .into_iter()
        .map(|b| {
            let user = users.iter().find(|u| u.id == b.user_id).map(UserInfo::from);
            BookingWithUser { booking: b, user }
        })
        .collect())
}

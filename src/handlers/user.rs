use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::lifecycle;
use crate::notify::Event;
use crate::store::{self, Location, NewBooking};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub pickup: Location,
    pub drop: Location,
    pub vehicle_type: String,
    pub scheduled_time: DateTime<Utc>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateBookingRequest {
    pub rating: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking: booking::Model,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<booking::Model>,
}

/// Create a booking and immediately try to broadcast it to eligible drivers.
/// With no eligible driver online it stays REQUESTED and is re-evaluated
/// when a matching driver becomes available.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let created = store::create(
        &state.db,
        NewBooking {
            user_id: claims.sub,
            pickup: payload.pickup,
            drop: payload.drop,
            vehicle_type: payload.vehicle_type,
            scheduled_time: payload.scheduled_time,
            special_instructions: payload.special_instructions,
        },
    )
    .await?;

    let booking = dispatch::broadcast(&state.db, &state.notifier, created).await?;
    Ok((StatusCode::CREATED, Json(BookingResponse { booking })))
}

/// Bookings shown on the rider dashboard: everything non-terminal, plus
/// completed trips that still await a rating.
pub async fn active_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<BookingListResponse>> {
    let bookings = store::active_for_user(&state.db, claims.sub).await?;
    Ok(Json(BookingListResponse { bookings }))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<BookingListResponse>> {
    let bookings = store::all_for_user(&state.db, claims.sub).await?;
    Ok(Json(BookingListResponse { bookings }))
}

pub async fn booking_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<BookingListResponse>> {
    let bookings = store::history_for_user(&state.db, claims.sub).await?;
    Ok(Json(BookingListResponse { bookings }))
}

pub async fn booking_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = owned_booking(&state, id, claims.sub).await?;
    Ok(Json(BookingResponse { booking }))
}

/// Cancel one of the rider's own bookings. Allowed until the trip starts;
/// the assigned driver (if any) is notified after the cancellation commits.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    let b = owned_booking(&state, id, claims.sub).await?;

    if !lifecycle::may_cancel(UserRole::User, b.status) {
        return Err(AppError::InvalidTransition {
            from: b.status.as_str().to_string(),
            to: BookingStatus::Cancelled.as_str().to_string(),
        });
    }

    let patch = booking::ActiveModel {
        cancel_reason: Set(payload.reason),
        cancelled_by: Set(Some("user".to_string())),
        ..Default::default()
    };
    let updated =
        store::transition(&state.db, b.id, b.status, BookingStatus::Cancelled, claims.sub, patch)
            .await?;

    if let Some(driver_id) = updated.driver_id {
        state.notifier.publish(
            UserRole::Driver,
            driver_id,
            Event::booking_cancelled(driver_id, &updated, "user"),
        );
    }

    Ok(Json(BookingResponse { booking: updated }))
}

/// Rate a completed trip, once. The score also folds into the driver's
/// running average.
pub async fn rate_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let b = owned_booking(&state, id, claims.sub).await?;
    if b.status != BookingStatus::Completed {
        return Err(AppError::InvalidTransition {
            from: b.status.as_str().to_string(),
            to: "RATED".to_string(),
        });
    }
    if b.rating_score.is_some() {
        return Err(AppError::AlreadyRated);
    }

    // Guarded write so a double submit attaches at most one rating.
    let result = booking::Entity::update_many()
        .set(booking::ActiveModel {
            rating_score: Set(Some(payload.rating)),
            rating_feedback: Set(payload.feedback),
            ..Default::default()
        })
        .filter(booking::Column::Id.eq(b.id))
        .filter(booking::Column::Status.eq(BookingStatus::Completed))
        .filter(booking::Column::RatingScore.is_null())
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::AlreadyRated);
    }

    if let Some(driver_id) = b.driver_id {
        if let Some(drv) = driver::Entity::find_by_id(driver_id).one(&state.db).await? {
            let count = drv.rating_count + 1;
            let rating =
                (drv.rating * drv.rating_count as f64 + payload.rating as f64) / count as f64;
            let mut patch: driver::ActiveModel = drv.into();
            patch.rating = Set(rating);
            patch.rating_count = Set(count);
            patch.update(&state.db).await?;
        }
    }

    tracing::info!(booking_id = %b.id, rating = payload.rating, "booking rated");
    let booking = store::read(&state.db, b.id).await?;
    Ok(Json(BookingResponse { booking }))
}

async fn owned_booking(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> AppResult<booking::Model> {
    let b = store::read(&state.db, id).await?;
    if b.user_id != user_id {
        return Err(AppError::Forbidden(
            "This booking belongs to another user".to_string(),
        ));
    }
    Ok(b)
}

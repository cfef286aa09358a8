use axum::{
    extract::{Path, State},
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver::{self, ApprovalState};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserInfo;
use crate::handlers::user::{BookingResponse, CancelBookingRequest};
use crate::lifecycle;
use crate::notify::Event;
use crate::store;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RejectDriverRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct DriverWithUser {
    #[serde(flatten)]
    pub driver: driver::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Serialize)]
pub struct DriverListResponse {
    pub drivers: Vec<DriverWithUser>,
}

#[derive(Debug, Serialize)]
pub struct DriverDecisionResponse {
    pub driver: driver::Model,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<user::Model>,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<booking::Model>,
}

pub async fn pending_drivers(
    State(state): State<AppState>,
) -> AppResult<Json<DriverListResponse>> {
    let drivers = driver::Entity::find()
        .filter(driver::Column::ApprovalState.eq(ApprovalState::Pending))
        .order_by_asc(driver::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(DriverListResponse {
        drivers: with_users(&state, drivers).await?,
    }))
}

pub async fn list_drivers(State(state): State<AppState>) -> AppResult<Json<DriverListResponse>> {
    let drivers = driver::Entity::find()
        .order_by_desc(driver::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(DriverListResponse {
        drivers: with_users(&state, drivers).await?,
    }))
}

/// Approve a pending driver application. Each application is decided once;
/// an already-decided application returns a conflict.
pub async fn approve_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DriverDecisionResponse>> {
    let drv = pending_driver(&state, id).await?;

    let mut patch: driver::ActiveModel = drv.into();
    patch.approval_state = Set(ApprovalState::Approved);
    patch.rejection_reason = Set(None);
    let driver = patch.update(&state.db).await?;

    tracing::info!(driver_id = %driver.id, "driver approved");
    Ok(Json(DriverDecisionResponse { driver }))
}

pub async fn reject_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectDriverRequest>,
) -> AppResult<Json<DriverDecisionResponse>> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::Validation(
            "A rejection reason is required".to_string(),
        ));
    }

    let drv = pending_driver(&state, id).await?;

    let mut patch: driver::ActiveModel = drv.into();
    patch.approval_state = Set(ApprovalState::Rejected);
    patch.rejection_reason = Set(Some(payload.reason.trim().to_string()));
    patch.is_available = Set(false);
    let driver = patch.update(&state.db).await?;

    tracing::info!(driver_id = %driver.id, "driver rejected");
    Ok(Json(DriverDecisionResponse { driver }))
}

pub async fn all_bookings(State(state): State<AppState>) -> AppResult<Json<BookingListResponse>> {
    let bookings = store::all(&state.db).await?;
    Ok(Json(BookingListResponse { bookings }))
}

/// Cancel any not-yet-started booking on a rider's behalf. Both the rider
/// and the assigned driver (if any) are notified.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> AppResult<Json<BookingResponse>> {
    let b = store::read(&state.db, id).await?;

    if !lifecycle::may_cancel(UserRole::Admin, b.status) {
        return Err(AppError::InvalidTransition {
            from: b.status.as_str().to_string(),
            to: BookingStatus::Cancelled.as_str().to_string(),
        });
    }

    let patch = booking::ActiveModel {
        cancel_reason: Set(payload.reason),
        cancelled_by: Set(Some("admin".to_string())),
        ..Default::default()
    };
    let updated =
        store::transition(&state.db, b.id, b.status, BookingStatus::Cancelled, claims.sub, patch)
            .await?;

    state.notifier.publish(
        UserRole::User,
        updated.user_id,
        Event::booking_cancelled(updated.user_id, &updated, "admin"),
    );
    if let Some(driver_id) = updated.driver_id {
        state.notifier.publish(
            UserRole::Driver,
            driver_id,
            Event::booking_cancelled(driver_id, &updated, "admin"),
        );
    }

    Ok(Json(BookingResponse { booking: updated }))
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<UserListResponse>> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(UserListResponse { users }))
}

async fn pending_driver(state: &AppState, id: Uuid) -> AppResult<driver::Model> {
    let drv = driver::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

    if drv.approval_state != ApprovalState::Pending {
        return Err(AppError::Conflict(format!(
            "Driver application already {}",
            match drv.approval_state {
                ApprovalState::Approved => "approved",
                ApprovalState::Rejected => "rejected",
                ApprovalState::Pending => "pending",
            }
        )));
    }
    Ok(drv)
}

async fn with_users(
    state: &AppState,
    drivers: Vec<driver::Model>,
) -> AppResult<Vec<DriverWithUser>> {
    let user_ids: Vec<Uuid> = drivers.iter().map(|d| d.user_id).collect();
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?;

    Ok(drivers
        .into_iter()
        .map(|d| {
            let user = users.iter().find(|u| u.id == d.user_id).map(UserInfo::from);
            DriverWithUser { driver: d, user }
        })
        .collect())
}

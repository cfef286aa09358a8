//! End-to-end booking lifecycle tests against an in-memory SQLite database,
//! driving the same handler functions the router mounts.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use migration::Migrator;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use uuid::Uuid;

use ride_booking_backend::entities::booking::{self, BookingStatus};
use ride_booking_backend::entities::driver::{self, ApprovalState};
use ride_booking_backend::entities::user::{self, UserRole};
use ride_booking_backend::handlers::driver as driver_api;
use ride_booking_backend::handlers::user as user_api;
use ride_booking_backend::notify::Notifier;
use ride_booking_backend::store::{self, Location};
use ride_booking_backend::utils::jwt::Claims;
use ride_booking_backend::{dispatch, AppError, AppResult, AppState, Config};

async fn test_state() -> AppState {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // A single pooled connection so every query sees the same in-memory db.
    opts.max_connections(1);
    let db: DatabaseConnection = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    AppState {
        db,
        config: Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
        },
        notifier: Notifier::new(),
    }
}

fn claims_for(u: &user::Model) -> Claims {
    let now = Utc::now();
    Claims {
        sub: u.id,
        email: u.email.clone(),
        role: u.role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
}

async fn seed_user(db: &DatabaseConnection, role: UserRole) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}@example.com", Uuid::new_v4())),
        password_hash: Set("not-a-real-hash".to_string()),
        name: Set("Test Person".to_string()),
        phone: Set(None),
        role: Set(role),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .unwrap()
}

async fn seed_driver(
    db: &DatabaseConnection,
    codes: &[&str],
    approval: ApprovalState,
    available: bool,
) -> (user::Model, driver::Model) {
    let u = seed_user(db, UserRole::Driver).await;
    let d = driver::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(u.id),
        license_number: Set("DL-TEST-001".to_string()),
        approval_state: Set(approval),
        rejection_reason: Set(None),
        is_available: Set(available),
        vehicle_types: Set(json!(codes)),
        primary_vehicle: Set(codes[0].to_string()),
        rating: Set(0.0),
        rating_count: Set(0),
        total_trips: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .unwrap();
    (u, d)
}

async fn create_booking(
    state: &AppState,
    rider: &user::Model,
    vehicle: &str,
    lead_minutes: i64,
) -> AppResult<booking::Model> {
    let (_, Json(response)) = user_api::create_booking(
        State(state.clone()),
        Extension(claims_for(rider)),
        Json(user_api::CreateBookingRequest {
            pickup: Location {
                address: "1 Origin St".to_string(),
                lat: 12.9716,
                lng: 77.5946,
            },
            drop: Location {
                address: "2 Destination Ave".to_string(),
                lat: 12.2958,
                lng: 76.6394,
            },
            vehicle_type: vehicle.to_string(),
            scheduled_time: Utc::now() + Duration::minutes(lead_minutes),
            special_instructions: None,
        }),
    )
    .await?;
    Ok(response.booking)
}

async fn accept(
    state: &AppState,
    driver_user: &user::Model,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let Json(response) = driver_api::accept_booking(
        State(state.clone()),
        Extension(claims_for(driver_user)),
        Path(booking_id),
    )
    .await?;
    Ok(response.booking)
}

#[tokio::test]
async fn test_short_lead_time_rejected() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;

    let err = create_booking(&state, &rider, "sedan", 10).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_booking_without_drivers_stays_requested() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Requested);
    assert!(b.driver_id.is_none());
}

#[tokio::test]
async fn test_booking_broadcasts_to_online_driver() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Broadcasted);

    let Json(requests) = driver_api::new_requests(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
    )
    .await
    .unwrap();
    assert_eq!(requests.bookings.len(), 1);
    assert_eq!(requests.bookings[0].booking.id, b.id);
}

#[tokio::test]
async fn test_vehicle_type_filters_candidates() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    // A sedan-only driver is not a candidate for an suv booking.
    let b = create_booking(&state, &rider, "suv", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Requested);

    let candidates = dispatch::eligible_drivers(&state.db, "suv").await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn test_full_lifecycle_happy_path() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, drv) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Broadcasted);

    let accepted = accept(&state, &driver_user, b.id).await.unwrap();
    assert_eq!(accepted.status, BookingStatus::Accepted);
    assert_eq!(accepted.driver_id, Some(drv.id));
    assert!(accepted.accepted_at.is_some());

    let Json(started) = driver_api::start_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();
    assert_eq!(started.booking.status, BookingStatus::InProgress);
    assert!(started.booking.started_at.is_some());

    let Json(completed) = driver_api::complete_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();
    assert_eq!(completed.booking.status, BookingStatus::Completed);
    assert!(completed.booking.completed_at.is_some());
    // Sedan base price plus a positive per-km component.
    let fare = completed.booking.fare.unwrap();
    assert!(fare > 10.0, "fare was {}", fare);

    let drv = dispatch::driver_for_user(&state.db, driver_user.id).await.unwrap();
    assert_eq!(drv.total_trips, 1);
}

#[tokio::test]
async fn test_concurrent_accepts_have_one_winner() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (user_a, drv_a) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;
    let (user_b, drv_b) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Broadcasted);

    let (first, second) = tokio::join!(
        accept(&state, &user_a, b.id),
        accept(&state, &user_b, b.id),
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one accept must win");

    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::StateConflict(_))));

    let stored = store::read(&state.db, b.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Accepted);
    assert!(stored.driver_id == Some(drv_a.id) || stored.driver_id == Some(drv_b.id));
}

#[tokio::test]
async fn test_second_completion_rejected() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["mini"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "mini", 45).await.unwrap();
    accept(&state, &driver_user, b.id).await.unwrap();
    driver_api::start_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();
    driver_api::complete_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();

    let err = driver_api::complete_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    // The trip counter moved exactly once.
    let drv = dispatch::driver_for_user(&state.db, driver_user.id).await.unwrap();
    assert_eq!(drv.total_trips, 1);
}

#[tokio::test]
async fn test_cancel_in_progress_rejected() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    accept(&state, &driver_user, b.id).await.unwrap();
    driver_api::start_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();

    let err = user_api::cancel_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::CancelBookingRequest {
            reason: Some("Changed my mind".to_string()),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let stored = store::read(&state.db, b.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::InProgress);
}

#[tokio::test]
async fn test_cancel_broadcasted_records_actor() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Broadcasted);

    let Json(cancelled) = user_api::cancel_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::CancelBookingRequest {
            reason: Some("Found another ride".to_string()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.booking.cancelled_by.as_deref(), Some("user"));
    assert!(cancelled.booking.cancelled_at.is_some());
    assert!(cancelled.booking.driver_id.is_none());
}

#[tokio::test]
async fn test_rating_requires_completion_and_attaches_once() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    accept(&state, &driver_user, b.id).await.unwrap();

    // Not completed yet.
    let err = user_api::rate_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::RateBookingRequest {
            rating: 5,
            feedback: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    driver_api::start_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();
    driver_api::complete_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(b.id),
    )
    .await
    .unwrap();

    let Json(rated) = user_api::rate_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::RateBookingRequest {
            rating: 4,
            feedback: Some("Smooth trip".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(rated.booking.rating_score, Some(4));

    // The score folds into the driver's running average.
    let drv = dispatch::driver_for_user(&state.db, driver_user.id).await.unwrap();
    assert_eq!(drv.rating_count, 1);
    assert!((drv.rating - 4.0).abs() < 1e-9);

    let err = user_api::rate_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::RateBookingRequest {
            rating: 1,
            feedback: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyRated));
}

#[tokio::test]
async fn test_unapproved_driver_cannot_accept() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (approved_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;
    let (pending_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Pending, true).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Broadcasted);

    let err = accept(&state, &pending_user, b.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotEligible(_)));

    // The approved driver can still take it.
    accept(&state, &approved_user, b.id).await.unwrap();
}

#[tokio::test]
async fn test_going_online_rebroadcasts_pending() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, false).await;

    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    assert_eq!(b.status, BookingStatus::Requested);

    driver_api::set_availability(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Json(driver_api::AvailabilityRequest { is_available: true }),
    )
    .await
    .unwrap();

    let stored = store::read(&state.db, b.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Broadcasted);
}

#[tokio::test]
async fn test_driver_history_lists_completed_only() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let (driver_user, _) =
        seed_driver(&state.db, &["sedan"], ApprovalState::Approved, true).await;

    let completed = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    accept(&state, &driver_user, completed.id).await.unwrap();
    driver_api::start_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(completed.id),
    )
    .await
    .unwrap();
    driver_api::complete_trip(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(completed.id),
    )
    .await
    .unwrap();

    let abandoned = create_booking(&state, &rider, "sedan", 45).await.unwrap();
    accept(&state, &driver_user, abandoned.id).await.unwrap();
    driver_api::cancel_booking(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
        Path(abandoned.id),
        Json(user_api::CancelBookingRequest {
            reason: Some("Vehicle breakdown".to_string()),
        }),
    )
    .await
    .unwrap();

    let Json(history) = driver_api::history(
        State(state.clone()),
        Extension(claims_for(&driver_user)),
    )
    .await
    .unwrap();
    assert_eq!(history.bookings.len(), 1);
    assert_eq!(history.bookings[0].booking.id, completed.id);
}

#[tokio::test]
async fn test_rating_out_of_range_rejected() {
    let state = test_state().await;
    let rider = seed_user(&state.db, UserRole::User).await;
    let b = create_booking(&state, &rider, "sedan", 45).await.unwrap();

    let err = user_api::rate_booking(
        State(state.clone()),
        Extension(claims_for(&rider)),
        Path(b.id),
        Json(user_api::RateBookingRequest {
            rating: 6,
            feedback: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

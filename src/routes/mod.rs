use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, driver, user, vehicles, ws};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_user};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Role-specific governor layers keyed by user id
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let user_governor = create_role_governor(RateLimitedRole::User);
    // IP-based governor for unauthenticated routes
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/register-driver", post(auth::register_driver))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    // Public catalog route
    let public_routes = Router::new()
        .route("/vehicles", get(vehicles::list_vehicles))
        .layer(public_governor);

    // Rider routes (requires auth + user role)
    // Rate limit: 100 requests per minute
    let booking_routes = Router::new()
        .route("/", post(user::create_booking))
        .route("/", get(user::my_bookings))
        .route("/active", get(user::active_bookings))
        .route("/history", get(user::booking_history))
        .route("/{id}", get(user::booking_details))
        .route("/{id}/cancel", post(user::cancel_booking))
        .route("/{id}/rate", post(user::rate_booking))
        .layer(user_governor)
        .layer(middleware::from_fn(require_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Driver routes (requires auth + driver role)
    // Rate limit: 500 requests per minute, covers the request polling
    let driver_routes = Router::new()
        .route("/profile", get(driver::get_profile))
        .route("/availability", put(driver::set_availability))
        .route("/requests/new", get(driver::new_requests))
        .route("/bookings/accepted", get(driver::accepted_bookings))
        .route("/bookings/{id}/accept", post(driver::accept_booking))
        .route("/bookings/{id}/start", post(driver::start_trip))
        .route("/bookings/{id}/complete", post(driver::complete_trip))
        .route("/bookings/{id}/cancel", post(driver::cancel_booking))
        .route("/history", get(driver::history))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/drivers/pending", get(admin::pending_drivers))
        .route("/drivers/{id}/approve", post(admin::approve_driver))
        .route("/drivers/{id}/reject", post(admin::reject_driver))
        .route("/drivers", get(admin::list_drivers))
        .route("/bookings", get(admin::all_bookings))
        .route("/bookings/{id}/cancel", post(admin::cancel_booking))
        .route("/users", get(admin::list_users))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // The websocket route authenticates via query-string token, before
    // the upgrade, so it sits outside the auth middleware.
    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/drivers", driver_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/ws", get(ws::ws_handler))
        .with_state(state)
}

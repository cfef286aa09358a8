use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::catalog;
use crate::entities::driver::{self, ApprovalState};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::create_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDriverRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub license_number: String,
    pub vehicle_types: Vec<String>,
    pub primary_vehicle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl From<&user::Model> for UserInfo {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
        }
    }
}

/// Register a new rider account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = create_account(&state, payload, UserRole::User).await?;
    issue_token(&state, &user)
}

/// Register a driver account. The driver profile starts PENDING and takes
/// part in dispatch only once an admin approves it.
pub async fn register_driver(
    State(state): State<AppState>,
    Json(payload): Json<RegisterDriverRequest>,
) -> AppResult<Json<AuthResponse>> {
    if payload.vehicle_types.is_empty() {
        return Err(AppError::Validation(
            "Select at least one vehicle type".to_string(),
        ));
    }
    for code in &payload.vehicle_types {
        if !catalog::is_valid_code(code) {
            return Err(AppError::Validation(format!("Unknown vehicle type: {}", code)));
        }
    }
    let primary = payload
        .primary_vehicle
        .clone()
        .unwrap_or_else(|| payload.vehicle_types[0].clone());
    if !payload.vehicle_types.contains(&primary) {
        return Err(AppError::Validation(
            "Primary vehicle must be one of the selected vehicle types".to_string(),
        ));
    }
    if payload.license_number.trim().is_empty() {
        return Err(AppError::Validation("License number is required".to_string()));
    }

    let account = RegisterRequest {
        email: payload.email,
        password: payload.password,
        name: payload.name,
        phone: payload.phone,
    };
    let user = create_account(&state, account, UserRole::Driver).await?;

    let profile = driver::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        license_number: Set(payload.license_number.trim().to_uppercase()),
        approval_state: Set(ApprovalState::Pending),
        rejection_reason: Set(None),
        is_available: Set(false),
        vehicle_types: Set(json!(payload.vehicle_types)),
        primary_vehicle: Set(primary),
        rating: Set(0.0),
        rating_count: Set(0),
        total_trips: Set(0),
        created_at: Set(Utc::now().into()),
    };
    profile.insert(&state.db).await?;

    tracing::info!(user_id = %user.id, "driver registered, awaiting approval");
    issue_token(&state, &user)
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&payload.email))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid email or password".to_string()))?;

    issue_token(&state, &user)
}

async fn create_account(
    state: &AppState,
    payload: RegisterRequest,
    role: UserRole,
) -> AppResult<user::Model> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(payload.name.trim().to_string()),
        phone: Set(payload.phone),
        role: Set(role),
        created_at: Set(Utc::now().into()),
    };

    Ok(new_user.insert(&state.db).await?)
}

fn issue_token(state: &AppState, user: &user::Model) -> AppResult<Json<AuthResponse>> {
    let token = create_token(
        user.id,
        &user.email,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(AuthResponse {
        token,
        user: UserInfo::from(user),
    }))
}

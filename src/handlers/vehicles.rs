use axum::Json;
use serde::Serialize;

use crate::catalog::{self, Vehicle};

#[derive(Debug, Serialize)]
pub struct VehicleListResponse {
    pub vehicles: &'static [Vehicle],
}

/// The fixed vehicle catalog, for booking forms and driver registration.
pub async fn list_vehicles() -> Json<VehicleListResponse> {
    Json(VehicleListResponse {
        vehicles: catalog::VEHICLES,
    })
}

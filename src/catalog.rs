//! Fixed vehicle catalog. Booking `vehicle_type` and driver `vehicle_types`
//! must come from this set.

/// Per-kilometre rate applied on top of the vehicle base price. Distance is
/// a rough haversine over pickup/drop, not an authoritative route length.
const PER_KM_RATE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Vehicle {
    pub code: &'static str,
    pub label: &'static str,
    pub capacity: u32,
    pub base_price: f64,
}

pub const VEHICLES: &[Vehicle] = &[
    Vehicle { code: "sedan", label: "Sedan", capacity: 4, base_price: 10.0 },
    Vehicle { code: "suv", label: "SUV", capacity: 7, base_price: 15.0 },
    Vehicle { code: "mini", label: "Mini", capacity: 4, base_price: 8.0 },
    Vehicle { code: "electric", label: "Electric", capacity: 4, base_price: 12.0 },
    Vehicle { code: "luxury", label: "Luxury", capacity: 4, base_price: 30.0 },
    Vehicle { code: "van", label: "Van", capacity: 8, base_price: 20.0 },
    Vehicle { code: "minibus", label: "Minibus", capacity: 15, base_price: 35.0 },
    Vehicle { code: "pickup", label: "Pickup Truck", capacity: 5, base_price: 18.0 },
    Vehicle { code: "convertible", label: "Convertible", capacity: 2, base_price: 25.0 },
    Vehicle { code: "sports", label: "Sports Car", capacity: 2, base_price: 40.0 },
    Vehicle { code: "limousine", label: "Limousine", capacity: 8, base_price: 50.0 },
    Vehicle { code: "hybrid", label: "Hybrid", capacity: 4, base_price: 11.0 },
    Vehicle { code: "wagon", label: "Station Wagon", capacity: 5, base_price: 12.0 },
    Vehicle { code: "hatchback", label: "Hatchback", capacity: 4, base_price: 9.0 },
    Vehicle { code: "coupe", label: "Coupe", capacity: 2, base_price: 15.0 },
    Vehicle { code: "motorcycle", label: "Motorcycle", capacity: 2, base_price: 5.0 },
    Vehicle { code: "rickshaw", label: "Auto Rickshaw", capacity: 3, base_price: 6.0 },
    Vehicle { code: "bicycle", label: "Bicycle", capacity: 1, base_price: 3.0 },
    Vehicle { code: "scooter", label: "Scooter", capacity: 2, base_price: 4.0 },
    Vehicle { code: "bus", label: "Bus", capacity: 30, base_price: 60.0 },
];

pub fn find(code: &str) -> Option<&'static Vehicle> {
    VEHICLES.iter().find(|v| v.code == code)
}

pub fn is_valid_code(code: &str) -> bool {
    find(code).is_some()
}

/// Fare for a completed trip, rounded to cents. Computed exactly once, at
/// the IN_PROGRESS -> COMPLETED transition.
pub fn fare(vehicle: &Vehicle, distance_km: f64) -> f64 {
    let raw = vehicle.base_price + distance_km.max(0.0) * PER_KM_RATE;
    (raw * 100.0).round() / 100.0
}

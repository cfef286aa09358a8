use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Admin-controlled approval state. Set exactly once away from `Pending`;
/// only approved drivers participate in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "driver")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub license_number: String,
    pub approval_state: ApprovalState,
    pub rejection_reason: Option<String>,
    pub is_available: bool,
    /// JSON array of catalog codes, e.g. `["sedan", "suv"]`. Non-empty;
    /// `primary_vehicle` is always a member.
    pub vehicle_types: Json,
    pub primary_vehicle: String,
    pub rating: f64,
    pub rating_count: i32,
    pub total_trips: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn vehicle_codes(&self) -> Vec<String> {
        self.vehicle_types
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn drives(&self, vehicle_type: &str) -> bool {
        self.vehicle_types
            .as_array()
            .map(|arr| arr.iter().any(|v| v.as_str() == Some(vehicle_type)))
            .unwrap_or(false)
    }
}

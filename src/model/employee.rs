use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "user_id": 7,
        "full_name": "Budi Santoso",
        "phone": "+628123456789",
        "position_id": 3,
        "division_id": 1,
        "is_active": true,
        "created_at": "2026-01-01T08:00:00",
        "updated_at": "2026-01-01T08:00:00"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    /// Unique: a user has at most one employee profile.
    #[schema(example = 7)]
    pub user_id: u64,

    #[schema(example = "Budi Santoso")]
    pub full_name: String,

    #[schema(example = "+628123456789", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 3)]
    pub position_id: u64,

    #[schema(example = 1)]
    pub division_id: u64,

    #[schema(example = true)]
    pub is_active: bool,

    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,

    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

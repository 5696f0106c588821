use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Division {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Engineering")]
    pub division_name: String,
    #[schema(example = true)]
    pub is_active: bool,
    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

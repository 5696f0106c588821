use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A job position. Always belongs to exactly one division.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Position {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "Backend Engineer")]
    pub position_name: String,
    #[schema(example = 1)]
    pub division_id: u64,
    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(example = "2026-01-01T08:00:00", format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attendance reason/category such as present, work from home or sick.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Status {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Present")]
    pub status_name: String,
    #[schema(example = "PRESENT")]
    pub code: String,
    #[schema(example = true)]
    pub is_active: bool,
}

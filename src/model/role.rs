use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Named bundle of permissions. `code` is the stable key, `role_name` the label.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Role {
    #[schema(example = 2)]
    pub id: u64,
    #[schema(example = "Staff")]
    pub role_name: String,
    #[schema(example = "STAFF")]
    pub code: String,
    #[schema(example = true)]
    pub is_active: bool,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Row of the `user` table. The credential hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: u64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// User joined with its role name, as returned by the user endpoints.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "username": "budi_santoso",
        "email": "budi@company.com",
        "role_id": 2,
        "role_name": "Staff",
        "is_active": true
    })
)]
pub struct UserDetail {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "budi_santoso")]
    pub username: String,
    #[schema(example = "budi@company.com")]
    pub email: String,
    #[schema(example = 2)]
    pub role_id: u64,
    #[schema(example = "Staff")]
    pub role_name: String,
    #[schema(example = true)]
    pub is_active: bool,
}

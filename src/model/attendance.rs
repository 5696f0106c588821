use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;

/// One attendance row per user per work day.
///
/// `work_date` is fixed when the row is created (the local calendar date of
/// the check-in) and never changes afterwards, even if the check-out happens
/// after midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "user_id": 7,
        "status_id": 1,
        "work_date": "2026-10-18",
        "clock_in": "2026-10-18T08:01:12",
        "clock_in_photo": "uploads/2026/10/18/7-in.jpg",
        "latitude_clock_in": -6.2,
        "longitude_clock_in": 106.816666,
        "clock_out": null,
        "clock_out_photo": null,
        "latitude_clock_out": null,
        "longitude_clock_out": null,
        "description": "On site",
        "is_clocked_in": true,
        "is_clocked_out": false,
        "created_at": "2026-10-18T08:01:12",
        "updated_at": "2026-10-18T08:01:12"
    })
)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    pub status_id: u64,
    #[schema(format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(format = "date-time", value_type = String)]
    pub clock_in: NaiveDateTime,
    pub clock_in_photo: String,
    pub latitude_clock_in: f64,
    pub longitude_clock_in: f64,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub clock_out: Option<NaiveDateTime>,
    pub clock_out_photo: Option<String>,
    pub latitude_clock_out: Option<f64>,
    pub longitude_clock_out: Option<f64>,
    pub description: Option<String>,
    pub is_clocked_in: bool,
    pub is_clocked_out: bool,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl Attendance {
    pub fn phase(&self) -> SessionPhase {
        match (self.is_clocked_in, self.is_clocked_out) {
            (true, false) => SessionPhase::Open,
            (_, true) => SessionPhase::Closed,
            (false, false) => SessionPhase::NoSession,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase() == SessionPhase::Open
    }
}

/// Where a user stands for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    NoSession,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Rejects non-finite values and points outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("latitude {latitude} is outside [-90, 90]"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("longitude {longitude} is outside [-180, 180]"));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Everything needed to open a session. Built by the attendance service.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: u64,
    pub status_id: u64,
    pub work_date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub photo: String,
    pub location: Coordinates,
    pub description: Option<String>,
}

/// Fields merged into the open row on check-out.
#[derive(Debug, Clone)]
pub struct CheckOutUpdate {
    pub status_id: Option<u64>,
    pub clock_out: NaiveDateTime,
    pub photo: String,
    pub location: Coordinates,
    pub description: Option<String>,
}

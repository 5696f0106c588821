use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::{created, ok},
    auth::auth::AuthUser,
    error::AppResult,
    model::attendance::{Attendance, SessionPhase},
    service::{
        AccessControl, AttendanceService,
        access::codes,
        attendance::{CheckInRequest, CheckOutRequest},
    },
    utils::pagination::{Page, PageQuery},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckInPayload {
    #[schema(example = 1)]
    pub status_id: u64,
    /// Stored reference to the check-in selfie (path or URL).
    #[validate(length(max = 512))]
    #[schema(example = "uploads/2026/10/18/7-in.jpg")]
    pub clock_in_photo: String,
    #[schema(example = json!(-6.2))]
    pub latitude: f64,
    #[schema(example = 106.816666)]
    pub longitude: f64,
    #[validate(length(max = 1000))]
    #[schema(example = "On site", nullable = true)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckOutPayload {
    /// Replaces the status chosen at check-in.
    #[schema(example = 2, nullable = true)]
    pub status_id: Option<u64>,
    #[validate(length(max = 512))]
    #[schema(example = "uploads/2026/10/18/7-out.jpg")]
    pub clock_out_photo: String,
    #[schema(example = json!(-6.2))]
    pub latitude: f64,
    #[schema(example = 106.816666)]
    pub longitude: f64,
    #[validate(length(max = 1000))]
    #[schema(example = "Left early for a client visit", nullable = true)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatus {
    pub state: SessionPhase,
    #[schema(format = "date", value_type = String, example = "2026-10-18")]
    pub work_date: NaiveDate,
    #[schema(nullable = true)]
    pub attendance: Option<Attendance>,
}

#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    request_body = CheckInPayload,
    responses(
        (status = 201, description = "Session opened", body = Attendance),
        (status = 400, description = "Invalid coordinates or missing photo"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing CREATE_ATTENDANCE"),
        (status = 404, description = "Unknown user or status"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "checkin_request", skip_all, fields(user_id = auth.user_id, username = %auth.username))]
pub async fn check_in(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    attendance: web::Data<AttendanceService>,
    payload: web::Json<CheckInPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::CREATE_ATTENDANCE).await?;
    payload.validate()?;

    let payload = payload.into_inner();
    let row = attendance
        .check_in(
            auth.user_id,
            CheckInRequest {
                status_id: payload.status_id,
                photo: payload.clock_in_photo,
                latitude: payload.latitude,
                longitude: payload.longitude,
                description: payload.description,
            },
        )
        .await?;

    Ok(created(row))
}

#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    request_body = CheckOutPayload,
    responses(
        (status = 200, description = "Session closed", body = Attendance),
        (status = 400, description = "Invalid coordinates or missing photo"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing CREATE_ATTENDANCE"),
        (status = 404, description = "No check-in today, or unknown status"),
        (status = 409, description = "Already checked out today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "checkout_request", skip_all, fields(user_id = auth.user_id, username = %auth.username))]
pub async fn check_out(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    attendance: web::Data<AttendanceService>,
    payload: web::Json<CheckOutPayload>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::CREATE_ATTENDANCE).await?;
    payload.validate()?;

    let payload = payload.into_inner();
    let row = attendance
        .check_out(
            auth.user_id,
            CheckOutRequest {
                status_id: payload.status_id,
                photo: payload.clock_out_photo,
                latitude: payload.latitude,
                longitude: payload.longitude,
                description: payload.description,
            },
        )
        .await?;

    Ok(ok(row))
}

#[utoipa::path(
    get,
    path = "/api/attendance/status",
    responses(
        (status = 200, description = "Caller's session for today", body = SessionStatus),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing VIEW_ATTENDANCE")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_status_request", skip_all, fields(user_id = auth.user_id, username = %auth.username))]
pub async fn status(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    attendance: web::Data<AttendanceService>,
) -> AppResult<HttpResponse> {
    access.require(auth.role_id, codes::VIEW_ATTENDANCE).await?;

    let work_date = attendance.today();
    let state = attendance.status(auth.user_id, work_date).await?;

    Ok(ok(SessionStatus {
        state: state.phase(),
        work_date,
        attendance: state.into_attendance(),
    }))
}

/// Own history needs VIEW_ATTENDANCE, anyone else's MANAGE_ATTENDANCE.
#[utoipa::path(
    get,
    path = "/api/attendance/user/{user_id}",
    params(("user_id" = u64, Path, description = "User whose history to list"), PageQuery),
    responses(
        (status = 200, description = "Attendance rows, newest work day first", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Permission missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_history_request", skip_all, fields(user_id = auth.user_id, username = %auth.username))]
pub async fn history(
    auth: AuthUser,
    access: web::Data<AccessControl>,
    attendance: web::Data<AttendanceService>,
    path: web::Path<u64>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let required = if user_id == auth.user_id {
        codes::VIEW_ATTENDANCE
    } else {
        codes::MANAGE_ATTENDANCE
    };
    access.require(auth.role_id, required).await?;

    let (_, per_page, offset) = query.resolve();
    let (rows, total) = attendance.history(user_id, per_page, offset).await?;

    Ok(HttpResponse::Ok().json(Page::new(rows, &query, total)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{
        App, HttpMessage,
        dev::Service,
        http::StatusCode,
        test::{TestRequest, call_service, init_service, read_body_json},
    };
    use chrono::NaiveDateTime;
    use serde_json::{Value, json};

    use super::*;
    use crate::service::clock::testing::FixedClock;
    use crate::store::memory::MemoryStore;

    const STAFF_ROLE: u64 = 2;
    const STAFF_USER: u64 = 7;
    const OTHER_USER: u64 = 8;

    fn services() -> (web::Data<AccessControl>, web::Data<AttendanceService>) {
        let store = Arc::new(MemoryStore::new());
        store.add_role(STAFF_ROLE, "STAFF", true);
        store.add_permission(1, codes::VIEW_ATTENDANCE);
        store.add_permission(2, codes::CREATE_ATTENDANCE);
        store.add_permission(3, codes::MANAGE_ATTENDANCE);
        store.grant(STAFF_ROLE, 1);
        store.grant(STAFF_ROLE, 2);
        store.add_user(STAFF_USER);
        store.add_user(OTHER_USER);
        store.add_status(1, "PRESENT", true);

        let now = NaiveDateTime::parse_from_str("2026-10-18 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = Arc::new(FixedClock::at(now));
        (
            web::Data::new(AccessControl::new(store.clone())),
            web::Data::new(AttendanceService::new(store, clock)),
        )
    }

    macro_rules! staff_app {
        () => {{
            let (access, attendance) = services();
            init_service(
                App::new()
                    .app_data(access)
                    .app_data(attendance)
                    .wrap_fn(|req, srv| {
                        req.extensions_mut().insert(AuthUser {
                            user_id: STAFF_USER,
                            username: "budi".into(),
                            role_id: STAFF_ROLE,
                        });
                        srv.call(req)
                    })
                    .route("/attendance/checkin", web::post().to(check_in))
                    .route("/attendance/checkout", web::post().to(check_out))
                    .route("/attendance/status", web::get().to(status))
                    .route("/attendance/user/{user_id}", web::get().to(history)),
            )
            .await
        }};
    }

    fn check_in_body() -> Value {
        json!({
            "status_id": 1,
            "clock_in_photo": "in.jpg",
            "latitude": -6.2,
            "longitude": 106.8,
            "description": "office"
        })
    }

    #[actix_web::test]
    async fn check_in_opens_a_session_once() {
        let app = staff_app!();

        let req = TestRequest::post()
            .uri("/attendance/checkin")
            .set_json(check_in_body())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = TestRequest::get().uri("/attendance/status").to_request();
        let body: Value = read_body_json(call_service(&app, req).await).await;
        assert_eq!(body["data"]["state"], "open");
        assert_eq!(body["data"]["work_date"], "2026-10-18");

        let req = TestRequest::post()
            .uri("/attendance/checkin")
            .set_json(check_in_body())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn check_out_without_check_in_is_not_found() {
        let app = staff_app!();

        let req = TestRequest::post()
            .uri("/attendance/checkout")
            .set_json(json!({
                "clock_out_photo": "out.jpg",
                "latitude": -6.2,
                "longitude": 106.8
            }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn out_of_range_latitude_is_bad_request() {
        let app = staff_app!();
        let mut body = check_in_body();
        body["latitude"] = json!(91.0);

        let req = TestRequest::post()
            .uri("/attendance/checkin")
            .set_json(body)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn history_of_another_user_needs_manage_permission() {
        let app = staff_app!();

        let req = TestRequest::get()
            .uri(&format!("/attendance/user/{OTHER_USER}"))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get()
            .uri(&format!("/attendance/user/{STAFF_USER}?per_page=500"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = read_body_json(resp).await;
        assert_eq!(body["per_page"], 100);
        assert_eq!(body["total"], 0);
    }
}

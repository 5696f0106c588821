use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::{
    attendance::{CheckInPayload, CheckOutPayload, SessionStatus},
    division::DivisionPayload,
    employee::{CreateEmployee, UpdateEmployee},
    permission::CreatePermission,
    position::PositionPayload,
    role::{AssignPermission, CreateRole},
    status::StatusPayload,
    user::{Availability, CheckEmail, CheckUsername, CreateUser, UpdateUser},
};
use crate::model::{
    attendance::{Attendance, SessionPhase},
    division::Division,
    employee::Employee,
    permission::{Permission, RolePermission},
    position::Position,
    role::Role,
    status::Status,
    user::UserDetail,
};
use crate::models::{LoginReqDto, TokenPair};
use crate::utils::pagination::PageQuery;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance System

Daily check-in / check-out tracking with role based access control.

### Key Features
- **Attendance**: one session per user per day, with photo and GPS on both ends
- **Access control**: roles hold permission codes; every protected endpoint checks one
- **Master data**: users, roles, permissions, statuses, divisions, positions, employees

### Security
Protected endpoints expect `Authorization: Bearer <access_token>` obtained from `/auth/login`.
Refresh and logout take the refresh token in the same header.

### Response Format
- Single resources: `{"status": "success", "data": ...}`
- Lists: `{"data": [...], "page": 1, "per_page": 20, "total": 42}`
- Errors: `{"status": "error", "message": "..."}`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::status,
        crate::api::attendance::history,

        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::create_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,
        crate::api::user::check_username,
        crate::api::user::check_email,

        crate::api::role::list_roles,
        crate::api::role::create_role,
        crate::api::role::role_permissions,
        crate::api::role::assign_permission,
        crate::api::role::remove_permission,
        crate::api::permission::list_permissions,
        crate::api::permission::create_permission,

        crate::api::status::list_statuses,
        crate::api::status::get_status,
        crate::api::status::create_status,
        crate::api::status::update_status,
        crate::api::status::delete_status,

        crate::api::division::list_divisions,
        crate::api::division::get_division,
        crate::api::division::create_division,
        crate::api::division::update_division,
        crate::api::division::delete_division,

        crate::api::position::list_positions,
        crate::api::position::get_position,
        crate::api::position::create_position,
        crate::api::position::update_position,
        crate::api::position::delete_position,

        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::create_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            Attendance,
            SessionPhase,
            SessionStatus,
            CheckInPayload,
            CheckOutPayload,
            UserDetail,
            CreateUser,
            UpdateUser,
            CheckUsername,
            CheckEmail,
            Availability,
            Role,
            CreateRole,
            Permission,
            RolePermission,
            AssignPermission,
            CreatePermission,
            Status,
            StatusPayload,
            Division,
            DivisionPayload,
            Position,
            PositionPayload,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            PageQuery
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and logout"),
        (name = "Attendance", description = "Daily check-in and check-out"),
        (name = "User", description = "User accounts"),
        (name = "Role", description = "Roles and permission grants"),
        (name = "Status", description = "Attendance statuses"),
        (name = "Division", description = "Divisions"),
        (name = "Position", description = "Positions within divisions"),
        (name = "Employee", description = "Employee profiles"),
    )
)]
pub struct ApiDoc;

/// Protected paths are declared under `/api`; rebase them onto the configured prefix.
pub fn openapi_for(api_prefix: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let prefix = api_prefix.trim_end_matches('/');

    doc.paths.paths = std::mem::take(&mut doc.paths.paths)
        .into_iter()
        .map(|(path, item)| match path.strip_prefix("/api/") {
            Some(rest) => (format!("{prefix}/{rest}"), item),
            None => (path, item),
        })
        .collect();
    doc
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

pub mod attendance;
pub mod division;
pub mod employee;
pub mod permission;
pub mod position;
pub mod role;
pub mod status;
pub mod user;

/// `200 {"status":"success","data":...}`
pub(crate) fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success", "data": data }))
}

/// `201 {"status":"success","data":...}`
pub(crate) fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(json!({ "status": "success", "data": data }))
}

pub(crate) fn message(msg: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success", "message": msg }))
}

pub mod attendance;
pub mod division;
pub mod employee;
pub mod permission;
pub mod position;
pub mod role;
pub mod status;
pub mod user;

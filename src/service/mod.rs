pub mod access;
pub mod attendance;
pub mod clock;

pub use access::AccessControl;
pub use attendance::AttendanceService;

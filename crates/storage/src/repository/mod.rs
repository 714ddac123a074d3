pub mod attendance;
pub mod registration;

pub use attendance::AttendanceRepository;
pub use registration::RegistrationRepository;

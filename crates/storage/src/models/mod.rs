pub mod attendance;
pub mod registration;

pub use attendance::{
    AttendanceStatus, ContestantRecord, ContingentRecord, EMAIL_STATUS_PENDING, ManagerRecord,
    TeamRecord, UpsertOutcome,
};
pub use registration::{
    AgeRange, ContingentInfo, Geography, ManagerRow, ManagerSnapshot, MemberRow, MemberSnapshot,
    RegistrationStatus, TeamRow, TeamSnapshot,
};

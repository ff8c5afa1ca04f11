pub mod absences;
pub mod admin;
pub mod core;
pub mod courses;
pub mod holidays;
pub mod inspectorate;
pub mod profiles;
pub mod students;
pub mod teacher;
pub mod workspace_bundle;

pub mod scenario;
pub mod schedule;
pub mod site;
pub mod target;

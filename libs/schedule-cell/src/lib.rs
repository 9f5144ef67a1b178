pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{SaveScheduleRequest, ScheduleError, ScheduleWindow, Slot};
pub use services::schedule::ScheduleService;
pub use services::slots::SlotService;

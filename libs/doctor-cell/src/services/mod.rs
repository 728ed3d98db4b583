pub mod availability;
pub mod doctor;
pub mod scheduling;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use scheduling::ScheduleService;

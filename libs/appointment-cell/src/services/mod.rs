pub mod booking;
pub mod events;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use events::{publish_event, AppointmentEvent};
pub use lifecycle::AppointmentLifecycle;

pub mod lifecycle;
pub mod processing;
pub mod reporting;

pub use lifecycle::PaymentLifecycle;
pub use processing::PaymentProcessingService;
pub use reporting::RevenueService;

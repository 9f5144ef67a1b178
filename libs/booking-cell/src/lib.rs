pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Booking, BookingError, BookingStatus, CheckoutOutcome, CheckoutRequest, CreateBookingRequest,
    Membership, MembershipType, PaymentStatus,
};
pub use services::booking::BookingService;
pub use services::checkout::CheckoutService;
pub use services::conflict::SlotConflictGuard;

pub mod booking;
pub mod checkout;
pub mod conflict;
pub mod fees;

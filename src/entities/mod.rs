pub mod booking;
pub mod booking_user;
pub mod mount;
pub mod payment;
pub mod revoked_token;
pub mod trail;
pub mod user;

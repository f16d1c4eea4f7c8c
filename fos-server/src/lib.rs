//! FranchiseOS signage backend service
//!
//! Assignment resolution, phone-OTP device pairing, SMS dispatch, and the
//! REST surface over the shared document store.

pub mod api;
pub mod otp;
pub mod playlist;
pub mod sms;

pub use api::{build_router, AppState};

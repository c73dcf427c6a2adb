//! Outbound customer email.

pub mod email;

pub use email::VerificationMailer;

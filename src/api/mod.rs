//! Caller-facing response shapes

pub mod response;

pub use response::{ErrorEnvelope, SuccessEnvelope, envelope};

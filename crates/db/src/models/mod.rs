//! Row models and DTOs.

pub mod job;
pub mod quota;
pub mod record;
pub mod status;

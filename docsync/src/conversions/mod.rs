//! Conversions from raw change messages into normalized entity changes.

pub mod envelope;
pub mod row;

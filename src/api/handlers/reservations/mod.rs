//! Reservation endpoints and booking policy.

pub(crate) mod handlers;
pub(crate) mod policy;
pub(crate) mod storage;
pub(crate) mod types;

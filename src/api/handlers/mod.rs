//! Route handlers for the reservation service.

pub mod auth;
pub mod health;
pub mod reservations;

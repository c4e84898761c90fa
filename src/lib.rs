//! # VacQ (Massage Shop Reservations)
//!
//! `vacq` is the backend for a massage-shop appointment booking
//! service: user registration with email-code verification, JWT
//! sessions, and reservation management against a catalog of shops.
//!
//! ## Accounts
//!
//! Registration is a two-step flow. A submission is held as a pending
//! record while a 6-digit code is emailed to the address; only a
//! correct code within its TTL promotes the record to a verified user
//! and issues a session token. Codes are stored as SHA-256 digests,
//! passwords as argon2 hashes.
//!
//! ## Booking Policy
//!
//! - Appointments use `DD-MM-YYYY` dates and `HH:MM` times, checked
//!   against each shop's operating hours (inclusive on both ends).
//! - A non-admin user may hold at most 3 reservations.
//! - Reservations may only be changed or cancelled at least 3 hours
//!   before the appointment; past appointments can always be removed.
//!
//! Admins bypass the quota, see every reservation, and may book on
//! behalf of other users.

pub mod api;
pub mod cli;

//! Registration, verification, and session endpoints.

pub(crate) mod login;
pub(crate) mod me;
pub(crate) mod register;
pub(crate) mod session;
pub(crate) mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verify;

pub use state::AuthConfig;

//! Client side of the API: session cell, typed HTTP calls and the form rules that mirror
//! the server's field policy.

pub mod api;
pub mod form;
pub mod location;
pub mod session;

pub use api::{ApiClient, ClientError};
pub use session::{Session, SessionHandle, SessionState};

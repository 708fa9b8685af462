//! HTTP API of the phone-link validator.
//!
//! Endpoints:
//! - `GET /`, `GET /info`, `GET /peers`, `GET /metrics`
//! - `POST /request`: a user asks for a phone number to be verified
//! - `POST /broadcast`: a peer relays a request it accepted
//! - `POST /submit`: a user submits the code received over SMS
//! - `POST /broadcastSubmit`: a peer relays a submit
//!
//! Every JSON answer is an envelope `{code, data, error}` served with HTTP 200.
//! Request bodies are checked field by field before anything reaches the
//! [`ValidatorApi`] implementation.

pub mod api;
pub mod error;
pub mod handlers;
pub mod params;
pub mod response;
pub mod server;

pub use api::ValidatorApi;
pub use error::RpcError;
pub use response::{ApiResponse, FieldError};
pub use server::RpcServer;

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

// These are documented public exports since handlers are written against them.
pub use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

/// Inbound and outbound JSON envelopes.
pub mod envelope;

pub use envelope::{BodyEncoding, ReplyEnvelope, RequestEnvelope};

/// Error handling.
pub mod error;

pub use error::DecodeError;

mod handler;

pub use handler::{invoke, Handler};

mod request;

pub use request::{decode, decode_slice, Request, RequestBody};

mod response;

pub use response::{ResponseCapture, ResponseWriter};

mod runtime;

pub use runtime::run_lambda;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Value of the `type` field of every inbound envelope.
pub const REQUEST_TYPE: &str = "HTTPJSON-REQ";

/// Value of the `type` field of every outbound envelope.
pub const REPLY_TYPE: &str = "HTTPJSON-REP";

/// Multi-valued header collection as it appears on the wire.
///
/// Each header name maps to the ordered list of values sent for that name.
pub type EnvelopeHeaders = IndexMap<String, Vec<String>>;

/// A single HTTP request delivered to the function as its invocation payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct RequestEnvelope {
  /// Set to the constant [`REQUEST_TYPE`].
  #[serde(rename = "type", default, deserialize_with = "null_as_default")]
  pub kind: String,
  /// Metadata about the HTTP request. Required for the request to be dispatched.
  #[serde(default)]
  pub meta: Option<RequestMeta>,
  /// HTTP request body (may be empty). Never base64-encoded.
  #[serde(default, deserialize_with = "null_as_default")]
  pub body: String,
}

/// HTTP metadata present on an inbound request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct RequestMeta {
  /// HTTP method used by the client (e.g., `GET` or `POST`).
  #[serde(deserialize_with = "null_as_default")]
  pub method: String,
  /// Path portion of the URL, without the query string.
  #[serde(deserialize_with = "null_as_default")]
  pub path: String,
  /// Query string, without the leading `?`.
  #[serde(deserialize_with = "null_as_default")]
  pub query: String,
  /// Host the request was addressed to, which may be of the form `host:port`.
  #[serde(deserialize_with = "null_as_default")]
  pub host: String,
  /// Protocol used by the client (e.g., `HTTP/1.1`).
  #[serde(deserialize_with = "null_as_default")]
  pub proto: String,
  /// HTTP request headers.
  #[serde(deserialize_with = "null_as_default")]
  pub headers: EnvelopeHeaders,
}

/// Encoding of the [`body`](ReplyEnvelope::body) field of an outbound envelope.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub enum BodyEncoding {
  /// The body is the raw response bytes interpreted as text.
  #[default]
  #[serde(rename = "")]
  None,
  /// The body is the standard base64 encoding of the raw response bytes.
  #[serde(rename = "base64")]
  Base64,
}

/// A single HTTP response returned to the platform as the invocation result.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ReplyEnvelope {
  /// Set to the constant [`REPLY_TYPE`].
  #[serde(rename = "type")]
  pub kind: String,
  /// Response status and headers.
  pub meta: ReplyMeta,
  /// Response body, encoded according to [`body_encoding`](ReplyEnvelope::body_encoding).
  pub body: String,
  /// Encoding of [`body`](ReplyEnvelope::body).
  #[serde(rename = "bodyEncoding", default)]
  pub body_encoding: BodyEncoding,
}

impl ReplyEnvelope {
  /// Return the raw response bytes, reversing any binary-safety encoding.
  pub fn decode_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
    match self.body_encoding {
      BodyEncoding::None => Ok(self.body.as_bytes().to_vec()),
      BodyEncoding::Base64 => BASE64_STANDARD.decode(&self.body),
    }
  }
}

/// HTTP response metadata.
///
/// Header values are always encoded as string arrays, even when a header has a single value.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ReplyMeta {
  /// HTTP status code (e.g., 200 or 404).
  pub status: u16,
  /// HTTP response headers.
  pub headers: EnvelopeHeaders,
}

// An explicit `null` decodes the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

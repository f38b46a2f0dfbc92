use crate::envelope::{RequestEnvelope, REQUEST_TYPE};
use crate::error::DecodeError;

use backtrace::Backtrace;
use http::header::CONTENT_LENGTH;
use http::uri::{Parts, PathAndQuery};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use log::{debug, warn};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

use std::io::{self, Cursor, Read};

/// HTTP request decoded from an inbound envelope.
#[derive(Debug)]
pub struct Request {
  method: Method,
  path: String,
  query: Option<String>,
  uri: Uri,
  host: String,
  proto: String,
  headers: HeaderMap,
  body: RequestBody,
}

impl Request {
  /// HTTP method (e.g., `GET` or `POST`).
  pub fn method(&self) -> &Method {
    &self.method
  }

  /// Request URL in origin form (path and optional query string).
  ///
  /// Characters that are not valid in a URI (e.g., spaces or non-ASCII characters) are
  /// percent-encoded. Use [`path`](Request::path) and [`query`](Request::query) for the values
  /// exactly as received.
  pub fn uri(&self) -> &Uri {
    &self.uri
  }

  /// Path portion of the request URL, exactly as received (`/` if empty).
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Query string portion of the request URL, exactly as received and without the leading `?`.
  pub fn query(&self) -> Option<&str> {
    self.query.as_deref()
  }

  /// Host the request was addressed to, exactly as provided by the platform.
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Protocol string (e.g., `HTTP/1.1`), exactly as provided by the platform.
  pub fn proto(&self) -> &str {
    &self.proto
  }

  /// HTTP request headers.
  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  /// Size of the request body in bytes.
  pub fn content_length(&self) -> u64 {
    self.body.len()
  }

  /// Request body, for reading in place.
  pub fn body_mut(&mut self) -> &mut RequestBody {
    &mut self.body
  }

  /// Consume the request and return its body.
  pub fn into_body(self) -> RequestBody {
    self.body
  }
}

/// Request body that may be read exactly once.
///
/// The bytes are already fully materialized from the inbound envelope, so reading never blocks and
/// [`close`](RequestBody::close) has nothing to release.
#[derive(Debug, Default)]
pub struct RequestBody(Cursor<Vec<u8>>);

impl RequestBody {
  fn new(body: String) -> Self {
    Self(Cursor::new(body.into_bytes()))
  }

  /// Total size of the body in bytes, including any bytes already read.
  pub fn len(&self) -> u64 {
    self.0.get_ref().len() as u64
  }

  /// Whether the body is empty.
  pub fn is_empty(&self) -> bool {
    self.0.get_ref().is_empty()
  }

  /// Release the body. Always succeeds.
  pub fn close(self) -> io::Result<()> {
    Ok(())
  }
}

impl Read for RequestBody {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.0.read(buf)
  }
}

/// Decode an inbound invocation payload into a [`Request`].
pub fn decode(event: serde_json::Value) -> Result<Request, DecodeError> {
  serde_path_to_error::deserialize::<_, RequestEnvelope>(event)
    .map_err(|err| DecodeError::MalformedEnvelope(Box::new(err), Backtrace::new()))
    .and_then(request_from_envelope)
}

/// Decode a raw JSON inbound envelope into a [`Request`].
pub fn decode_slice(event: &[u8]) -> Result<Request, DecodeError> {
  serde_path_to_error::deserialize::<_, RequestEnvelope>(
    &mut serde_json::Deserializer::from_slice(event),
  )
  .map_err(|err| DecodeError::MalformedEnvelope(Box::new(err), Backtrace::new()))
  .and_then(request_from_envelope)
}

fn request_from_envelope(envelope: RequestEnvelope) -> Result<Request, DecodeError> {
  if envelope.kind != REQUEST_TYPE {
    warn!(
      "unexpected envelope type `{}` (expected `{REQUEST_TYPE}`)",
      envelope.kind
    );
  }

  let meta = match envelope.meta {
    Some(meta) if !meta.method.is_empty() => meta,
    _ => return Err(DecodeError::MissingMeta(Backtrace::new())),
  };

  let method = Method::from_bytes(meta.method.as_bytes())
    .map_err(|err| DecodeError::InvalidMethod(meta.method.clone(), err, Backtrace::new()))?;

  let mut target = meta.path;
  if !meta.query.is_empty() {
    target.push('?');
    target.push_str(&meta.query);
  }
  let (path, query, uri) = parse_target(&target)
    .map_err(|err| DecodeError::InvalidUrl(target.clone(), err, Backtrace::new()))?;

  let mut headers = HeaderMap::new();
  for (name, values) in &meta.headers {
    let header_name = HeaderName::from_bytes(name.as_bytes())
      .map_err(|err| DecodeError::InvalidHeader(name.clone(), Box::new(err), Backtrace::new()))?;
    for value in values {
      let header_value = HeaderValue::from_str(value).map_err(|err| {
        DecodeError::InvalidHeader(name.clone(), Box::new(err), Backtrace::new())
      })?;
      headers.append(header_name.clone(), header_value);
    }
  }

  // The envelope body is authoritative for the body length.
  if !envelope.body.is_empty() {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(envelope.body.len()));
  }

  debug!("decoded request {method} {uri} ({} body bytes)", envelope.body.len());

  Ok(Request {
    method,
    path,
    query,
    uri,
    host: meta.host,
    proto: meta.proto,
    headers,
    body: RequestBody::new(envelope.body),
  })
}

/// Reason a request target was rejected.
#[derive(Debug, Error)]
enum TargetError {
  #[error("invalid control character in URL")]
  ControlCharacter,
  #[error("invalid URL escape `{0}`")]
  InvalidEscape(String),
}

// Characters that may appear in a request target but not in an `http::Uri`. `%` is left alone
// since escapes have already been validated.
const URI_ENCODE_SET: &AsciiSet = &CONTROLS
  .add(b' ')
  .add(b'"')
  .add(b'#')
  .add(b'<')
  .add(b'>')
  .add(b'[')
  .add(b'\\')
  .add(b']')
  .add(b'^')
  .add(b'`')
  .add(b'{')
  .add(b'|')
  .add(b'}');

type ParsedTarget = (String, Option<String>, Uri);

/// Split a request target into its path and query, rejecting control characters and malformed
/// escapes in the path or fragment. The query string is not validated beyond control characters.
fn parse_target(
  target: &str,
) -> Result<ParsedTarget, Box<dyn std::error::Error + Send + Sync + 'static>> {
  if target.bytes().any(|b| b < b' ' || b == 0x7f) {
    return Err(Box::new(TargetError::ControlCharacter));
  }

  let (target, fragment) = target.split_once('#').unwrap_or((target, ""));
  validate_escapes(fragment)?;

  let (path, query) = match target.split_once('?') {
    Some((path, query)) => (path, Some(query)),
    None => (target, None),
  };
  validate_escapes(path)?;
  let path = if path.is_empty() { "/" } else { path };

  let mut encoded = utf8_percent_encode(path, URI_ENCODE_SET).to_string();
  if let Some(query) = query {
    encoded.push('?');
    encoded.extend(utf8_percent_encode(query, URI_ENCODE_SET));
  }

  let mut parts = Parts::default();
  parts.path_and_query = Some(PathAndQuery::try_from(encoded)?);
  let uri = Uri::from_parts(parts)?;

  Ok((path.to_owned(), query.map(str::to_owned), uri))
}

fn validate_escapes(component: &str) -> Result<(), TargetError> {
  let bytes = component.as_bytes();
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%' {
      let escape = bytes.get(i + 1..i + 3);
      if !escape.map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit)) {
        let end = bytes.len().min(i + 3);
        return Err(TargetError::InvalidEscape(
          String::from_utf8_lossy(&bytes[i..end]).into_owned(),
        ));
      }
      i += 3;
    } else {
      i += 1;
    }
  }
  Ok(())
}

use crate::envelope::{BodyEncoding, EnvelopeHeaders, ReplyEnvelope, ReplyMeta, REPLY_TYPE};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};

use std::io::{self, Write};

/// Handler-facing view of an HTTP response under construction.
///
/// Response body bytes are written via the [`Write`] supertrait, so `write!` and
/// [`write_all`](Write::write_all) work as expected. Writing the body does not fix the status code;
/// [`set_status`](ResponseWriter::set_status) may be called at any point before the handler
/// returns.
pub trait ResponseWriter: Write {
  /// Live response headers, which may be modified until the handler returns.
  fn headers_mut(&mut self) -> &mut HeaderMap;

  /// Set the response status code. The last value set wins.
  fn set_status(&mut self, status: StatusCode);
}

/// [`ResponseWriter`] that buffers everything the handler writes so that it can be converted into
/// a [`ReplyEnvelope`] once the handler returns.
#[derive(Clone, Debug)]
pub struct ResponseCapture {
  status: StatusCode,
  headers: HeaderMap,
  body: Vec<u8>,
}

impl Default for ResponseCapture {
  fn default() -> Self {
    Self {
      status: StatusCode::OK,
      headers: HeaderMap::new(),
      body: Vec::new(),
    }
  }
}

impl ResponseCapture {
  /// Construct an empty capture with a `200 OK` status.
  pub fn new() -> Self {
    Self::default()
  }

  /// Status code set by the handler (`200 OK` if none was set).
  pub fn status(&self) -> StatusCode {
    self.status
  }

  /// Headers set by the handler.
  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  /// Body bytes written by the handler.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Convert the captured response into an outbound envelope.
  ///
  /// Bodies whose `Content-Type` is absent, `application/json`, or `text/*` are emitted as text.
  /// Any other non-empty body is base64-encoded so that arbitrary bytes survive the JSON transport.
  pub fn to_envelope(&self) -> ReplyEnvelope {
    let (body, body_encoding) = if self.should_base64_encode() {
      (BASE64_STANDARD.encode(&self.body), BodyEncoding::Base64)
    } else {
      (
        String::from_utf8_lossy(&self.body).into_owned(),
        BodyEncoding::None,
      )
    };

    ReplyEnvelope {
      kind: REPLY_TYPE.to_string(),
      meta: ReplyMeta {
        status: self.status.as_u16(),
        headers: envelope_headers(&self.headers),
      },
      body,
      body_encoding,
    }
  }

  /// Consume the capture and convert it into an outbound envelope.
  pub fn into_envelope(self) -> ReplyEnvelope {
    self.to_envelope()
  }

  fn should_base64_encode(&self) -> bool {
    if self.body.is_empty() {
      return false;
    }

    // Only the first value counts, matching a case-insensitive single-value lookup.
    let content_type = self
      .headers
      .get(CONTENT_TYPE)
      .map(|value| value.as_bytes())
      .unwrap_or_default();

    !(content_type.is_empty()
      || content_type == mime::APPLICATION_JSON.as_ref().as_bytes()
      || content_type.starts_with(b"text/"))
  }
}

impl Write for ResponseCapture {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.body.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl ResponseWriter for ResponseCapture {
  fn headers_mut(&mut self) -> &mut HeaderMap {
    &mut self.headers
  }

  fn set_status(&mut self, status: StatusCode) {
    self.status = status;
  }
}

fn envelope_headers(headers: &HeaderMap) -> EnvelopeHeaders {
  headers
    .keys()
    .map(|name| {
      (
        name.as_str().to_owned(),
        headers
          .get_all(name)
          .iter()
          .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
          .collect(),
      )
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::{ResponseCapture, ResponseWriter};
  use crate::envelope::BodyEncoding;

  use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
  use base64::Engine;
  use http::header::{CONTENT_TYPE, SET_COOKIE};
  use http::{HeaderValue, StatusCode};
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use std::io::Write;

  fn capture_with(content_type: Option<&'static str>, body: &[u8]) -> ResponseCapture {
    let mut capture = ResponseCapture::new();
    if let Some(content_type) = content_type {
      capture
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    capture.write_all(body).unwrap();
    capture
  }

  #[test]
  fn test_empty_body() {
    let mut capture = capture_with(Some("image/png"), b"");
    capture.set_status(StatusCode::NO_CONTENT);

    let reply = capture.to_envelope();
    assert_eq!(reply.body, "");
    assert_eq!(reply.body_encoding, BodyEncoding::None);
    assert_eq!(reply.meta.status, 204);
    assert_eq!(reply.meta.headers["content-type"], vec!["image/png"]);
  }

  #[test]
  fn test_text_bodies() {
    for (content_type, body) in [
      (None, "hello"),
      (Some("application/json"), r#"{"a":1}"#),
      (Some("text/plain"), "hi"),
      (Some("text/html; charset=utf-8"), "<p>hi</p>"),
    ] {
      let reply = capture_with(content_type, body.as_bytes()).into_envelope();
      assert_eq!(reply.body_encoding, BodyEncoding::None, "{content_type:?}");
      assert_eq!(reply.body, body);
    }
  }

  #[test]
  fn test_binary_bodies() {
    let png = [0xFF, 0xD8, 0x00, 0x89, 0x50, 0x4E, 0x47];
    for content_type in [
      "image/png",
      "application/octet-stream",
      // Only the exact `application/json` value is treated as text.
      "application/json; charset=utf-8",
      "application/xml",
    ] {
      let reply = capture_with(Some(content_type), &png).into_envelope();
      assert_eq!(reply.body_encoding, BodyEncoding::Base64, "{content_type}");
      assert_eq!(reply.body, BASE64_STANDARD.encode(png));
      assert_eq!(reply.decode_body().unwrap(), png.to_vec());
    }
  }

  #[test]
  fn test_content_type_lookup_is_case_insensitive() {
    let mut capture = ResponseCapture::new();
    capture
      .headers_mut()
      .insert("Content-Type", HeaderValue::from_static("image/gif"));
    write!(capture, "GIF89a").unwrap();

    assert_eq!(capture.to_envelope().body_encoding, BodyEncoding::Base64);
  }

  #[test]
  fn test_invalid_utf8_text_body() {
    let reply = capture_with(Some("text/plain"), b"ok\xFF").into_envelope();
    assert_eq!(reply.body_encoding, BodyEncoding::None);
    assert_eq!(reply.body, "ok\u{FFFD}");
  }

  #[test]
  fn test_status_last_write_wins() {
    let mut capture = ResponseCapture::new();
    assert_eq!(capture.status(), StatusCode::OK);

    write!(capture, "body before status").unwrap();
    capture.set_status(StatusCode::CREATED);
    capture.set_status(StatusCode::NOT_FOUND);
    capture.set_status(StatusCode::IM_A_TEAPOT);

    assert_eq!(capture.to_envelope().meta.status, 418);
    assert_eq!(capture.body(), b"body before status");
  }

  #[test]
  fn test_multi_value_headers() {
    let mut capture = ResponseCapture::new();
    let headers = capture.headers_mut();
    headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
    headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
    headers.insert("x-removed", HeaderValue::from_static("gone"));
    headers.remove("x-removed");
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

    assert_eq!(
      serde_json::to_value(capture.to_envelope()).unwrap(),
      json!({
        "type": "HTTPJSON-REP",
        "meta": {
          "status": 200,
          "headers": {
            "set-cookie": ["a=1", "b=2"],
            "content-type": ["text/plain"]
          }
        },
        "body": "",
        "bodyEncoding": ""
      })
    );
  }

  #[test]
  fn test_conversion_is_idempotent() {
    let mut capture = capture_with(Some("image/png"), &[1, 2, 3]);
    capture.set_status(StatusCode::ACCEPTED);

    let first = capture.to_envelope();
    let second = capture.to_envelope();
    assert_eq!(first, second);
    assert_eq!(capture.into_envelope(), first);
  }

  #[test]
  fn test_reply_snapshot() {
    let mut capture = ResponseCapture::new();
    capture
      .headers_mut()
      .insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    capture.write_all(&[0, 1, 2, 253, 254, 255]).unwrap();
    capture.set_status(StatusCode::PARTIAL_CONTENT);

    insta::assert_json_snapshot!(capture.to_envelope(), @r###"
    {
      "type": "HTTPJSON-REP",
      "meta": {
        "status": 206,
        "headers": {
          "content-type": [
            "application/octet-stream"
          ]
        }
      },
      "body": "AAEC/f7/",
      "bodyEncoding": "base64"
    }
    "###);
  }
}

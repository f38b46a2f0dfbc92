use crate::envelope::ReplyEnvelope;
use crate::error::DecodeError;
use crate::request::{decode, Request};
use crate::response::{ResponseCapture, ResponseWriter};

use log::debug;

/// Synchronous HTTP handler invoked once per inbound envelope.
///
/// Handlers signal completion by returning. Errors raised while handling a request are the
/// handler's own responsibility: they should be converted into an appropriate status code and
/// body written to the `response` rather than escaping the handler.
///
/// Any `Fn(&mut dyn ResponseWriter, Request)` closure implements this trait.
pub trait Handler {
  /// Handle a single request by writing the response status, headers, and body to `response`.
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request);
}

impl<F> Handler for F
where
  F: Fn(&mut dyn ResponseWriter, Request),
{
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    self(response, request)
  }
}

/// Handle a single invocation: decode the inbound envelope, run `handler` against a fresh
/// [`ResponseCapture`], and convert the captured response into an outbound envelope.
///
/// If the envelope cannot be decoded, the handler is not invoked and the error is returned.
pub fn invoke<H>(handler: &H, event: serde_json::Value) -> Result<ReplyEnvelope, DecodeError>
where
  H: Handler + ?Sized,
{
  let request = decode(event)?;
  let method = request.method().clone();
  let uri = request.uri().clone();

  let mut capture = ResponseCapture::new();
  handler.serve_http(&mut capture, request);

  let reply = capture.into_envelope();
  debug!(
    "{method} {uri} -> {} ({} body bytes)",
    reply.meta.status,
    reply.body.len()
  );

  Ok(reply)
}

use crate::error::format_error;
use crate::handler::{invoke, Handler};

use futures::future;
use lambda_runtime::{service_fn, LambdaEvent};
use log::error;

/// Start the Lambda runtime and dispatch each invocation to `handler`.
///
/// Every invocation payload must be an inbound request envelope. The handler's response is returned
/// as an outbound envelope. Payloads that cannot be decoded fail the invocation without invoking
/// the handler.
///
/// # Example
///
/// ```rust,ignore
/// use httpjson_lambda::{run_lambda, Request, ResponseWriter};
///
/// use std::io::Write;
///
/// #[tokio::main]
/// pub async fn main() {
///   env_logger::init();
///
///   run_lambda(|response: &mut dyn ResponseWriter, request: Request| {
///     let _ = write!(response, "Hello from {}", request.path());
///   })
///   .await
/// }
/// ```
pub async fn run_lambda<H>(handler: H)
where
  H: Handler,
{
  lambda_runtime::run(service_fn(|event: LambdaEvent<serde_json::Value>| {
    future::ready(invoke(&handler, event.payload).map_err(|err| {
      error!(
        "Failed to decode request envelope (request ID {}): {}",
        event.context.request_id,
        format_error(&err, Some(err.name()), err.backtrace())
      );
      lambda_runtime::Error::from(err)
    }))
  }))
  .await
  .expect("Lambda run loop should never exit")
}

// Until std::error::Backtrace is fully stabilized, we can't embed a type named `Backtrace` within
// a thiserror::Error (see https://github.com/dtolnay/thiserror/issues/204).
use backtrace::Backtrace as _Backtrace;
use itertools::Itertools;
use thiserror::Error;

/// Error that occurred while decoding an inbound envelope into a [`Request`](crate::Request).
///
/// Decoding errors are fatal for the invocation: the handler is never invoked and the error is
/// returned to the platform instead of a reply envelope.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DecodeError {
  /// Invalid HTTP header name or value.
  #[error("invalid request header `{0}`")]
  InvalidHeader(
    String,
    #[source] Box<dyn std::error::Error + Send + Sync + 'static>,
    _Backtrace,
  ),
  /// Invalid HTTP method.
  #[error("invalid request method `{0}`")]
  InvalidMethod(String, #[source] http::method::InvalidMethod, _Backtrace),
  /// Request path and query string do not form a valid URL.
  #[error("invalid request URL `{0}`")]
  InvalidUrl(
    String,
    #[source] Box<dyn std::error::Error + Send + Sync + 'static>,
    _Backtrace,
  ),
  /// Inbound event is not a well-formed request envelope.
  #[error("malformed request envelope")]
  MalformedEnvelope(
    #[source] Box<serde_path_to_error::Error<serde_json::Error>>,
    _Backtrace,
  ),
  /// Request metadata or request method not provided.
  #[error("request meta not provided")]
  MissingMeta(_Backtrace),
}

impl DecodeError {
  /// Return the backtrace associated with the error, if known.
  pub fn backtrace(&self) -> Option<&_Backtrace> {
    match self {
      DecodeError::InvalidHeader(_, _, backtrace)
      | DecodeError::InvalidMethod(_, _, backtrace)
      | DecodeError::InvalidUrl(_, _, backtrace)
      | DecodeError::MalformedEnvelope(_, backtrace)
      | DecodeError::MissingMeta(backtrace) => Some(backtrace),
    }
  }

  /// Return the name of the error variant (e.g., `MissingMeta`).
  pub fn name(&self) -> &str {
    match self {
      DecodeError::InvalidHeader(_, _, _) => "InvalidHeader",
      DecodeError::InvalidMethod(_, _, _) => "InvalidMethod",
      DecodeError::InvalidUrl(_, _, _) => "InvalidUrl",
      DecodeError::MalformedEnvelope(_, _) => "MalformedEnvelope",
      DecodeError::MissingMeta(_) => "MissingMeta",
    }
  }
}

/// Helper function for formatting an error as a string containing a human-readable chain of causes.
///
/// This function will walk over the chain of causes returned by
/// [`Error::source`](std::error::Error::source) and append each underlying error (using the
/// [`Display`](std::fmt::Display) trait).
///
/// # Arguments
///
/// * `err` - Error to format.
/// * `name` - Optional name of the error type/variant (e.g., `DecodeError::MissingMeta`).
/// * `backtrace` - Optional [`Backtrace`](backtrace::Backtrace) indicating where the top-level
///   error occurred.
pub fn format_error(
  err: &(dyn std::error::Error),
  name: Option<&str>,
  backtrace: Option<&_Backtrace>,
) -> String {
  let err_line = name
    .map(|n| format!("{}: {}", n, err))
    .unwrap_or_else(|| err.to_string());

  let top_error = if let Some(bt) = backtrace {
    format!("{err_line}\n  stack trace:\n{}", format_backtrace(bt, 4))
  } else {
    err_line
  };

  let cause_str = ErrorCauseIterator(err.source())
    .map(|cause| format!("  caused by: {cause}"))
    .join("\n");

  if !cause_str.is_empty() {
    format!("{top_error}\n{cause_str}")
  } else {
    top_error
  }
}

struct ErrorCauseIterator<'a>(Option<&'a (dyn std::error::Error + 'static)>);

impl<'a> Iterator for ErrorCauseIterator<'a> {
  type Item = &'a (dyn std::error::Error + 'static);

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.0;
    self.0 = current.and_then(|err| err.source());
    current
  }
}

fn format_backtrace(backtrace: &_Backtrace, indent: usize) -> String {
  let indent_str = " ".repeat(indent);
  format!("{backtrace:?}")
    .lines()
    .map(|line| format!("{indent_str}{line}"))
    .join("\n")
}

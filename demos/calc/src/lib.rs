use headers::{ContentType, HeaderMapExt};
use httpjson_lambda::{Handler, Method, Request, ResponseWriter, StatusCode};
use log::{error, info};
use mime::Mime;
use thiserror::Error;

use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

/// Calculator page rendering.
pub mod page;

use page::HomePage;

/// 1x1 transparent PNG served at `/pixel.png`.
pub const PIXEL_PNG: &[u8] = &[
  0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
  0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
  0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
  0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
  0x42, 0x60, 0x82,
];

/// Errors produced while handling a calculator request.
#[derive(Debug, Error)]
pub enum HandlerError {
  #[error("request body is not valid form data")]
  InvalidForm(#[source] FromUtf8Error),
  #[error("no route for {0} {1}")]
  NotFound(Method, String),
  #[error("failed to read request body")]
  ReadBody(#[source] io::Error),
  #[error("failed to write response body")]
  WriteBody(#[source] io::Error),
}

impl HandlerError {
  /// Write a response appropriate for the error: 4xx with a plain-text explanation for client
  /// errors, or an empty 500 for internal errors.
  pub fn respond(self, response: &mut dyn ResponseWriter) {
    let (status, body) = match &self {
      HandlerError::InvalidForm(_) => (StatusCode::BAD_REQUEST, Some(self.to_string())),
      HandlerError::NotFound(_, _) => (
        StatusCode::NOT_FOUND,
        Some("404 page not found".to_string()),
      ),
      HandlerError::ReadBody(_) | HandlerError::WriteBody(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, None)
      }
    };

    response.set_status(status);
    if let Some(body) = body {
      info!("Responding with error status {status}: {self}");
      response.headers_mut().typed_insert(ContentType::text());
      if let Err(err) = response.write_all(body.as_bytes()) {
        error!("failed to write error response: {err}");
      }
    } else {
      error!("Responding with error status {status}: {self}");
    }
  }
}

enum Route {
  Home,
  Pixel,
  Sum,
}

impl Route {
  fn for_request(request: &Request) -> Option<Self> {
    match (request.method(), request.path()) {
      (&Method::GET, "/") => Some(Route::Home),
      (&Method::GET, "/pixel.png") => Some(Route::Pixel),
      (&Method::POST, "/sum") => Some(Route::Sum),
      _ => None,
    }
  }
}

/// Router for the calculator web page.
///
/// * `GET /` renders an empty calculator form.
/// * `POST /sum` adds the `a` and `b` form fields and renders the result.
/// * `GET /pixel.png` serves a binary image.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalcRouter;

impl CalcRouter {
  /// Construct a new router.
  pub fn new() -> Self {
    Self
  }
}

impl Handler for CalcRouter {
  fn serve_http(&self, response: &mut dyn ResponseWriter, request: Request) {
    info!("{} {}", request.method(), request.uri());

    let result = match Route::for_request(&request) {
      Some(Route::Home) => home(response),
      Some(Route::Pixel) => pixel(response),
      Some(Route::Sum) => sum(response, request),
      None => Err(HandlerError::NotFound(
        request.method().clone(),
        request.path().to_owned(),
      )),
    };

    if let Err(err) = result {
      err.respond(response);
    }
  }
}

fn home(response: &mut dyn ResponseWriter) -> Result<(), HandlerError> {
  render(response, &HomePage::default())
}

fn pixel(response: &mut dyn ResponseWriter) -> Result<(), HandlerError> {
  response.headers_mut().typed_insert(ContentType::png());
  response
    .write_all(PIXEL_PNG)
    .map_err(HandlerError::WriteBody)
}

fn sum(response: &mut dyn ResponseWriter, mut request: Request) -> Result<(), HandlerError> {
  let form = if is_form(&request) {
    let mut body = Vec::new();
    request
      .body_mut()
      .read_to_end(&mut body)
      .map_err(HandlerError::ReadBody)?;
    parse_form(&String::from_utf8(body).map_err(HandlerError::InvalidForm)?)?
  } else {
    Vec::new()
  };

  let a = form_number(&form, "a");
  let b = form_number(&form, "b");
  render(response, &HomePage { a, b, sum: a + b })
}

fn render(response: &mut dyn ResponseWriter, page: &HomePage) -> Result<(), HandlerError> {
  response.set_status(StatusCode::OK);
  response.headers_mut().typed_insert(ContentType::html());
  response
    .write_all(page.render().as_bytes())
    .map_err(HandlerError::WriteBody)
}

fn is_form(request: &Request) -> bool {
  request
    .headers()
    .typed_get::<ContentType>()
    .map(Mime::from)
    .map_or(false, |mime| {
      mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()
    })
}

fn parse_form(body: &str) -> Result<Vec<(String, String)>, HandlerError> {
  body
    .split('&')
    .filter(|pair| !pair.is_empty())
    .map(|pair| {
      let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
      Ok((decode_form_component(name)?, decode_form_component(value)?))
    })
    .collect()
}

fn decode_form_component(component: &str) -> Result<String, HandlerError> {
  urlencoding::decode(&component.replace('+', " "))
    .map(|decoded| decoded.into_owned())
    .map_err(HandlerError::InvalidForm)
}

// Missing or unparseable numbers count as zero.
fn form_number(form: &[(String, String)], name: &str) -> f64 {
  form
    .iter()
    .find(|(field, _)| field == name)
    .and_then(|(_, value)| value.parse().ok())
    .unwrap_or_default()
}

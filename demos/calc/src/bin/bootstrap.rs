use calc::CalcRouter;
use env_logger::Env;
use httpjson_lambda::run_lambda;

#[tokio::main]
pub async fn main() {
  // TIP: Use the `log4rs` crate for more fine-grained control over logging.
  env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));

  run_lambda(CalcRouter::new()).await
}

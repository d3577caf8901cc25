use atlas_autoscaler::{function_handler, Config};
use lambda_runtime::{run, service_fn, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    let config = &config;

    run(service_fn(move |event| async move {
        function_handler(event, config).await
    }))
    .await
}

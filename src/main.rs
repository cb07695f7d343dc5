use std::convert::Infallible;
use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use concord::handlers::api_handler;
use concord::utils::docker_utils::{BollardClient, DockerClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let address =
        env::var("CONCORD_LISTEN_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("CONCORD_LISTEN_PORT").unwrap_or_else(|_| "9450".to_string());

    let docker: Arc<dyn DockerClient> = Arc::new(BollardClient::connect()?);

    let listener = TcpListener::bind(format!("{}:{}", address, port)).await?;
    tracing::info!(%address, %port, "concord listening");

    loop {
        let (stream, remote) = listener.accept().await?;
        let docker = docker.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |request| {
                let docker = docker.clone();
                async move { Ok::<_, Infallible>(api_handler::route(request, docker).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%remote, error = %err, "connection closed with error");
            }
        });
    }
}

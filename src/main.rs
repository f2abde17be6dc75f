//! Demo binary for `streamframe`.
//!
//! `serve` runs a named-pipe server that echoes request bodies back; `send`
//! sends one request to such a server and prints the response.

mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command, SendArgs};
use streamframe::{
    config::StreamingConfig,
    endpoint::{NamedPipeClient, NamedPipeServer, ReconnectPolicy},
    message::{StreamingRequest, StreamingResponse},
    protocol::{RequestHandler, handler_fn},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "serving metrics");
    }

    let mut config = StreamingConfig::default();
    if let Some(root) = cli.pipe_root {
        config = config.with_pipe_root(root);
    }

    match cli.command {
        Command::Serve(args) => {
            serve(&args.name, config.with_reconnect(ReconnectPolicy::enabled())).await
        }
        Command::Send(args) => send(args, &config).await,
    }
}

fn echo_handler() -> Arc<dyn RequestHandler> {
    Arc::new(handler_fn(|request| async move {
        let body = request.read_body_as_string().await.ok()?;
        info!(verb = %request.verb, path = %request.path, length = body.len(), "request received");
        Some(StreamingResponse::create(200, (!body.is_empty()).then_some(body)))
    }))
}

async fn serve(name: &str, config: StreamingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = NamedPipeServer::bind(name, echo_handler(), &config).await?;
    info!(incoming = %server.paths().incoming().display(), "waiting for client");
    server.start().await?;
    info!("client connected");
    tokio::signal::ctrl_c().await?;
    server.disconnect().await;
    Ok(())
}

async fn send(args: SendArgs, config: &StreamingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = NamedPipeClient::new(&args.name, Arc::new(handler_fn(|_| async { None::<StreamingResponse> })), config)?;
    client.connect().await?;

    let mut request = StreamingRequest::create(args.verb, args.path);
    if let Some(body) = args.body {
        request.set_body(body);
    }
    let response = client.send(request).await?;
    println!("{}", response.status_code);
    let body = response.read_body_as_string().await?;
    if !body.is_empty() {
        println!("{body}");
    }
    client.disconnect().await;
    Ok(())
}

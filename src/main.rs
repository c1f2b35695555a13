use std::process;

use bedrock_agent::{build_model, init_tracing, Agent, AgentServer, AppConfig, ModelInfo, Result};

const TRACING_TARGET_STARTUP: &str = "bedrock_agent::startup";
const SERVICE_NAME: &str = "bedrock-agent";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        if tracing::enabled!(tracing::Level::ERROR) {
            tracing::error!(target: TRACING_TARGET_STARTUP, error = %err, "terminated with error");
        } else {
            eprintln!("Error: {err}");
        }
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env is normal outside local development.
    let dotenv = dotenvy::dotenv();

    let config = AppConfig::load()?;
    init_tracing(SERVICE_NAME, &config.telemetry)?;
    if let Err(err) = dotenv {
        tracing::debug!(target: TRACING_TARGET_STARTUP, error = %err, "no .env loaded");
    }

    let addr = config.socket_addr()?;
    let model = build_model(&config.model).await?;
    let server = AgentServer::new(Agent::new(model), &config).await;
    log_banner(&config, addr, server.model_info());

    server.serve(addr).await
}

fn log_banner(config: &AppConfig, addr: std::net::SocketAddr, info: &ModelInfo) {
    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        provider = config.model.provider.as_str(),
        model = %config.model.model_id,
        region = %config.model.region,
        "starting {SERVICE_NAME}"
    );
    for (method, path) in [
        ("POST", "/agent"),
        ("POST", "/explain-element"),
        ("GET", "/health"),
        ("GET", "/"),
    ] {
        tracing::info!(target: TRACING_TARGET_STARTUP, "  {method} http://{addr}{path}");
    }
    if !info.credentials_configured {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            provider = info.provider,
            "no model credentials found; replies will use the fallback text"
        );
    }
}

use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use workflow_stub::{router, StubState};

#[derive(Parser, Debug)]
#[command(name = "workflow-stub")]
#[command(about = "In-memory workflow API for running flowprobe features locally")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "WORKFLOW_STUB_ADDR", default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    info!("Starting workflow stub {}", env!("CARGO_PKG_VERSION"));

    let app = router(Arc::new(StubState::seeded()));
    let listener = TcpListener::bind(&cli.addr).await?;
    info!("Workflow stub listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

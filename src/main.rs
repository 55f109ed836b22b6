use clap::Parser;
use tracing_subscriber::EnvFilter;

use voxec::bootstrap;
use voxec::Config;

#[derive(Parser, Debug)]
#[command(name = "voxec", version, about = "Voice-driven executive")]
struct Cli {
    /// Project directory the coding agent and knowledge index operate on.
    /// Overrides VOXEC_PROJECT_DIR.
    #[arg(long)]
    project_dir: Option<std::path::PathBuf>,

    /// Log filter, e.g. "info" or "voxec=debug".
    #[arg(long, env = "VOXEC_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log)?)
        .with_target(false)
        .init();

    let mut config = Config::from_env()?;
    if let Some(dir) = cli.project_dir {
        config.jobs.project_dir = dir;
    }

    tracing::info!(
        project_dir = %config.jobs.project_dir.display(),
        local_model = %config.llm.local_model,
        cloud_model = %config.llm.cloud_model,
        "Starting voxec"
    );

    bootstrap::run(config).await?;
    Ok(())
}

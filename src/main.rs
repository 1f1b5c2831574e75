use clap::Parser;
use pmd_gemini_service::cli::args::Args;
use pmd_gemini_service::config::Config;
use pmd_gemini_service::infrastructure::setup_logging;
use pmd_gemini_service::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    setup_logging(config.logging_config()?)?;

    tracing::info!(
        pmd_binary = %config.pmd.binary.display(),
        scratch_root = %config.scratch_root.display(),
        findings_exit_code = config.pmd.findings_exit_code,
        "starting PMD-Gemini service"
    );

    Server::new(&config)?.run().await
}

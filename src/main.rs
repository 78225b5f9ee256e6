use anyhow::Result;
use funcvm::cli::Cli;
use funcvm::config::Config;
use funcvm::utils::print_error;

#[tokio::main]
async fn main() -> Result<()> {
    funcvm::init_logging();

    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!(e))?;

    // Parse CLI arguments and execute
    let cli = Cli::new(config);
    if let Err(e) = cli.run().await {
        print_error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}

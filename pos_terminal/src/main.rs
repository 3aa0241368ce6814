use clap::Parser;
use dotenvy::dotenv;
use pos_terminal::{
    cli::{run_command, Arguments},
    config::TerminalConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    let config = TerminalConfig::from_env_or_default();
    run_command(args.command, config).await?;
    Ok(())
}

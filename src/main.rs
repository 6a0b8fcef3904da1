use clap::Parser;

use stock_ranking::cli::Cli;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = stock_ranking::app::run(cli).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

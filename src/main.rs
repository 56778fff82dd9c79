use clap::Parser;
use moviebot_updater::cli::Cli;
use moviebot_updater::display_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.execute().await {
        display_error(&e);
        std::process::exit(1);
    }
}

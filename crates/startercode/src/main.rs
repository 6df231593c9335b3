use clap::Parser;

use startercode::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = startercode::execute(cli).await {
        eprintln!("startercode failed: {err:#}");
        std::process::exit(1);
    }
}

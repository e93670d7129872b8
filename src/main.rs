//! Stackwright CLI — declarative deployment topology builder.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "stackwright",
    version,
    about = "Declarative deployment topology builder: static site, container service and host-header routing"
)]
struct Cli {
    #[command(subcommand)]
    command: stackwright::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = stackwright::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

use anyhow::Result;
use clap::Parser;
use vigil::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}

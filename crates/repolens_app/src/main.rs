mod app;
mod cli;
mod effects;
mod logging;
mod persistence;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    logging::initialize(args.log_destination);
    app::run(args)
}

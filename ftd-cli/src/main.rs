mod posterior;

use anyhow::Result;
use clap::Command;
use env_logger::Env;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "ftd";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Genome-wide scoring of nuclease protection footprints across many datasets.")
        .subcommand_required(true)
        .subcommand(posterior::cli::create_posterior_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // POSTERIOR SCORING
        //
        Some((posterior::cli::POSTERIOR_CMD, matches)) => {
            posterior::handlers::run_posterior(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

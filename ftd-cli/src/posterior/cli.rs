use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const POSTERIOR_CMD: &str = "compute-posterior";
pub const DEFAULT_OUT: &str = "-";

pub fn create_posterior_cli() -> Command {
    Command::new(POSTERIOR_CMD)
        .author("Databio")
        .about("Score nuclease protection at every position of a set of intervals across many datasets.")
        .arg(
            Arg::new("metadata")
                .required(true)
                .help("Tab-separated table: id, dispersion model, count store, beta prior (or '!')"),
        )
        .arg(
            Arg::new("intervals")
                .required(true)
                .help("BED file of intervals to score (optionally gzipped)"),
        )
        .arg(
            arg!(--"fdr-cutoff" <CUTOFF> "Positions at or below this FDR inform the prior")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--"post-cutoff" <CUTOFF> "Posterior cutoff; positions scoring above -ln(cutoff) are written")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(-p --processors <N> "Number of scoring threads")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--readers <N> "Number of count reading threads")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--"queue-size" <N> "Intervals held in memory before readers block")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--window <RADIUS> "Half-width of the likelihood window")
                .value_parser(value_parser!(usize)),
        )
        .arg(arg!(--tmpdir <DIR> "Directory for the temporary chunk files"))
        .arg(
            arg!(--"keep-chunks" "Keep the per-processor chunk files after merging")
                .action(ArgAction::SetTrue),
        )
        .arg(arg!(-o --output <OUTPUT> "Output file ('-' for stdout)"))
        .arg(
            arg!(-q --quiet "Hide the progress bar")
                .action(ArgAction::SetTrue),
        )
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::fix_date::{self, FixDateOptions};
use crate::commands::fix_lccn::{self, FixLccnOptions};
use crate::commands::CommandReport;
use crate::logging;
use crate::ndnp::config::{CliOverrides, load_config};

#[derive(Parser, Debug)]
#[command(
    name = "ndnp-repair",
    version,
    about = "Repair issue dates and LCCNs across NDNP newspaper batches"
)]
pub struct Cli {
    /// Log every change without making it.
    #[arg(short = 'd', long, alias = "dry_run", global = true)]
    pub dry_run: bool,

    /// Only report warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Extra processing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the batches to search.
    #[arg(short, long, alias = "search_dir", value_name = "DIR", global = true)]
    pub search_dir: Option<PathBuf>,

    /// Print the final report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace a wrong issue date under one LCCN.
    FixDate(FixDateArgs),
    /// Move issues in a date window from a wrong LCCN to the right one.
    FixLccn(FixLccnArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FixDateArgs {
    /// LCCN to be fixed.
    pub lccn: String,
    /// Incorrect date, YYYY-MM-DD.
    pub bad_date: String,
    /// Corrected date, YYYY-MM-DD.
    pub new_date: String,
}

#[derive(Args, Debug, Clone)]
pub struct FixLccnArgs {
    pub bad_lccn: String,
    pub correct_lccn: String,
    /// First affected issue date, YYYY-MM-DD.
    pub start_date: String,
    /// Last affected issue date, YYYY-MM-DD.
    pub end_date: String,
}

fn print_report(report: &CommandReport, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if !quiet {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.quiet, cli.verbose);

    let cfg = load_config(&CliOverrides {
        search_dir: cli.search_dir.clone(),
        dry_run: cli.dry_run,
    })?;

    let report = match &cli.command {
        Commands::FixDate(args) => fix_date::run(
            &cfg,
            &FixDateOptions {
                lccn: args.lccn.clone(),
                bad_date: args.bad_date.clone(),
                new_date: args.new_date.clone(),
            },
        )?,
        Commands::FixLccn(args) => fix_lccn::run(
            &cfg,
            &FixLccnOptions {
                bad_lccn: args.bad_lccn.clone(),
                correct_lccn: args.correct_lccn.clone(),
                start_date: args.start_date.clone(),
                end_date: args.end_date.clone(),
            },
        )?,
    };

    print_report(&report, cli.json, cli.quiet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ndnp-repair",
            "fix-lccn",
            "sn12345678",
            "sn87654321",
            "1923-01-01",
            "1923-01-31",
            "-d",
            "--search_dir",
            "/srv/batches",
        ])
        .expect("parse");
        assert!(cli.dry_run);
        assert_eq!(cli.search_dir, Some(PathBuf::from("/srv/batches")));
        assert!(matches!(cli.command, Commands::FixLccn(_)));
    }
}

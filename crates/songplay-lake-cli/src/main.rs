//! CLI entry point for the songplay-lake ETL.

mod error;
mod logging;

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use snafu::ResultExt;
use songplay_lake_core::{
    EtlConfig, EtlContext, MalformedRecordPolicy, RunReport, load_catalog, run_activity_pipeline,
    run_all, run_catalog_pipeline,
};

use crate::{
    error::{CliResult, LoadConfigSnafu, PipelineSnafu, StartRunSnafu},
    logging::{LogFormat, init_logging},
};

#[derive(Debug, Args)]
struct RunArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input root (overrides `input.root`)
    #[arg(long)]
    input: Option<String>,

    /// Output root (overrides `output.root`)
    #[arg(long)]
    output: Option<String>,

    /// Date used for the run directory, YYYY-MM-DD (default: today)
    #[arg(long = "run-date")]
    run_date: Option<NaiveDate>,

    /// Write tables directly under the output root
    #[arg(long = "no-date-stamp", default_value_t = false)]
    no_date_stamp: bool,

    /// Skip malformed input lines instead of failing
    #[arg(long = "skip-malformed", default_value_t = false)]
    skip_malformed: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run both pipelines (catalog loaded once)
    Run(RunArgs),
    /// Write the songs and artists tables
    Catalog(RunArgs),
    /// Write the users, time and songplays tables
    Activity(RunArgs),
}

#[derive(Debug, Parser)]
#[command(name = "songplay-etl", version, about)]
struct Cli {
    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

fn build_config(args: &RunArgs) -> CliResult<EtlConfig> {
    let mut config = match &args.config {
        Some(path) => EtlConfig::load(path).context(LoadConfigSnafu { path: path.clone() })?,
        None => EtlConfig::default(),
    };

    if let Some(input) = &args.input {
        config.input.root = input.clone();
    }
    if let Some(output) = &args.output {
        config.output.root = output.clone();
    }
    if args.no_date_stamp {
        config.output.date_stamped = false;
    }
    if args.skip_malformed {
        config.input.malformed_records = MalformedRecordPolicy::Skip;
    }
    Ok(config)
}

fn print_report(report: &RunReport) {
    println!("Output root: {}", report.run_root);
    println!("{:<10} {:>10} {:>11} {:>6}", "table", "rows", "partitions", "files");
    for t in &report.tables {
        println!(
            "{:<10} {:>10} {:>11} {:>6}",
            t.table, t.rows, t.partitions, t.files
        );
    }
    if report.unmatched_songplays > 0 {
        println!(
            "Songplays without a catalog match: {}",
            report.unmatched_songplays
        );
    }
    if report.skipped() > 0 {
        println!(
            "Skipped malformed records: {} catalog, {} activity",
            report.catalog_skipped, report.activity_skipped
        );
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let args = match &cli.cmd {
        Command::Run(a) | Command::Catalog(a) | Command::Activity(a) => a,
    };
    let config = build_config(args)?;
    let run_date = args.run_date.unwrap_or_else(|| Local::now().date_naive());
    let mut ctx = EtlContext::new(config, run_date).context(StartRunSnafu)?;

    match cli.cmd {
        Command::Run(_) => run_all(&mut ctx)
            .await
            .context(PipelineSnafu { pipeline: "ETL" })?,
        Command::Catalog(_) => run_catalog_pipeline(&mut ctx)
            .await
            .context(PipelineSnafu {
                pipeline: "Catalog",
            })?,
        Command::Activity(_) => {
            let catalog = load_catalog(&mut ctx).await.context(PipelineSnafu {
                pipeline: "Activity",
            })?;
            run_activity_pipeline(&mut ctx, &catalog)
                .await
                .context(PipelineSnafu {
                    pipeline: "Activity",
                })?
        }
    }

    let report = ctx.close();
    print_report(&report);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

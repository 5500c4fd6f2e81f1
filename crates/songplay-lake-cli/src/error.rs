use std::path::PathBuf;

use snafu::Snafu;
use songplay_lake_core::{ConfigError, PipelineError};

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Could not load configuration from {}: {source}", path.display()))]
    LoadConfig { path: PathBuf, source: ConfigError },

    #[snafu(display("Failed to start ETL run: {source}"))]
    StartRun {
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
    },

    #[snafu(display("{pipeline} pipeline failed: {source}"))]
    Pipeline {
        pipeline: &'static str,
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
    },
}

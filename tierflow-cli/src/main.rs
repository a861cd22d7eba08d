mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tierflow::config::SourceFormat;
use tierflow::inspect::DEFAULT_LIMIT;

use crate::commands::PipelineArgs;
use crate::logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "tierflow",
    version,
    about = "Run staging, standard and serving data pipelines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true, env = "TIERFLOW_LOG_LEVEL")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Only run tasks of this stage (staging, standard, serving)
        #[arg(long)]
        stage: Option<String>,
        /// Only run tasks with this name
        #[arg(long)]
        task: Option<String>,
        /// Print a sample of every executed serving task's output
        #[arg(long)]
        show_result: bool,
        /// Seconds to wait after each streaming query starts; queries are
        /// stopped when the run ends. Without it, the process keeps running
        /// until the queries end or Ctrl-C.
        #[arg(long, value_name = "SECS")]
        await_termination: Option<u64>,
    },
    /// Print rows of a task's output as JSON
    Inspect {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Stage the task belongs to
        #[arg(long)]
        stage: String,
        /// Task name
        #[arg(long)]
        task: String,
        /// Maximum rows to print
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Infer a task schema from a sample file
    Sample {
        /// Sample file or directory
        path: PathBuf,
        /// File format (default: from the file extension)
        #[arg(long, value_parser = parse_format)]
        format: Option<SourceFormat>,
    },
    /// Delete everything a pipeline has written
    Clean {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Sleep between externally scheduled stage runs
    Wait {
        /// Seconds to wait
        #[arg(long, default_value_t = 10)]
        duration: u64,
    },
}

fn parse_format(value: &str) -> Result<SourceFormat, String> {
    SourceFormat::parse(value).ok_or_else(|| format!("unsupported format '{value}' (csv, json, parquet)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run {
            pipeline,
            stage,
            task,
            show_result,
            await_termination,
        } => {
            let options = commands::run::RunArgs {
                stage,
                task,
                show_result,
                await_termination,
            };
            commands::run::execute(&pipeline, &options).await
        }
        Commands::Inspect {
            pipeline,
            stage,
            task,
            limit,
        } => commands::inspect::execute(&pipeline, &stage, &task, limit).await,
        Commands::Sample { path, format } => commands::sample::execute(&path, format),
        Commands::Clean { pipeline } => commands::clean::execute(&pipeline).await,
        Commands::Wait { duration } => {
            commands::wait::execute(duration).await;
            Ok(())
        }
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trailcount-processor")]
#[command(about = "Normalizes historic national-park visitor counting-sensor exports")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full normalization pipeline and write the traffic table
    Process {
        #[arg(short, long, help = "Directory of CSV exports or a zip bundle of them")]
        input: PathBuf,

        #[arg(
            short,
            long,
            help = "Output file path [default: output/trailcount-normalized-{YYMMDD}.parquet]"
        )]
        output_file: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Parquet)]
        format: OutputFormat,

        #[arg(long, help = "TOML file overriding the built-in station tables")]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "snappy")]
        compression: String,

        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,

        #[arg(long, default_value = "false")]
        validate_only: bool,

        #[arg(long, help = "Write the run report as JSON")]
        report: Option<PathBuf>,

        #[arg(long, default_value = "false", help = "Memory-map export files while reading")]
        mmap: bool,
    },

    /// Run the pipeline and print the run report without writing output
    Validate {
        #[arg(short, long, help = "Directory of CSV exports or a zip bundle of them")]
        input: PathBuf,

        #[arg(long, help = "TOML file overriding the built-in station tables")]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = num_cpus::get())]
        max_workers: usize,
    },

    /// Display information about a normalized Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,

        #[arg(
            long,
            default_value = "0",
            help = "Maximum rows to analyze (0 = all rows)"
        )]
        analysis_limit: usize,
    },
}

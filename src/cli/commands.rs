use crate::analyzers::TrafficAnalyzer;
use crate::cli::args::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::Metric;
use crate::processors::{Pipeline, PIPELINE_STAGES};
use crate::utils::filename::generate_default_output_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};
use tracing::info;

pub fn run(cli: Cli) -> Result<()> {
    // Progress bars would interleave with log lines on stderr
    let quiet = cli.verbose && cli.log_file.is_none();

    match cli.command {
        Commands::Process {
            input,
            output_file,
            format,
            config,
            compression,
            max_workers,
            validate_only,
            report,
            mmap,
        } => {
            let output_file =
                output_file.unwrap_or_else(|| generate_default_output_filename(format.extension()));

            println!("Processing counting-sensor exports...");
            println!("Input: {}", input.display());
            if !validate_only {
                println!("Output file: {}", output_file.display());
            }
            println!("Workers: {}", max_workers);

            // Fail on a bad compression name before the pipeline runs
            let parquet_writer = ParquetWriter::new().with_compression(&compression)?;

            let config = PipelineConfig::load(config.as_deref())?;
            let pipeline = Pipeline::new(config)
                .with_max_workers(max_workers)
                .with_mmap(mmap);

            let progress = ProgressReporter::new(PIPELINE_STAGES, "Reading exports...", quiet);
            let output = pipeline.run(&input, Some(&progress))?;
            progress.finish_with_message(&format!(
                "Normalized {} hourly rows",
                output.table.len()
            ));

            println!("\n{}", output.report.generate_summary());

            if let Some(report_path) = report {
                output.report.write_json(&report_path)?;
                println!("Run report written to: {}", report_path.display());
            }

            if validate_only {
                println!("Validation complete - no output file written");
                return Ok(());
            }

            match format {
                OutputFormat::Parquet => parquet_writer.write_table(&output.table, &output_file)?,
                OutputFormat::Csv => CsvWriter::new().write_table(&output.table, &output_file)?,
            }

            info!(path = %output_file.display(), rows = output.table.len(), "Output written");
            println!("Output written to: {}", output_file.display());
        }

        Commands::Validate {
            input,
            config,
            max_workers,
        } => {
            println!("Validating counting-sensor exports...");
            println!("Input: {}", input.display());

            let config = PipelineConfig::load(config.as_deref())?;
            let pipeline = Pipeline::new(config).with_max_workers(max_workers);

            let progress = ProgressReporter::new(PIPELINE_STAGES, "Reading exports...", quiet);
            let output = pipeline.run(&input, Some(&progress))?;
            progress.finish_with_message("Validation complete");

            println!("\n{}", output.report.generate_summary());
        }

        Commands::Info {
            file,
            sample,
            analysis_limit,
        } => {
            println!("Analyzing Parquet file: {}", file.display());

            // Get basic file info
            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;

            let limit = (analysis_limit > 0).then_some(analysis_limit);
            let analyzer = TrafficAnalyzer::new();
            let stats = analyzer.analyze_parquet_with_limit(&file, limit)?;

            println!("\n{}", stats.detailed_summary());

            println!("\nFile Details:");
            println!("{}", file_info.summary());

            if sample > 0 {
                println!("\nSample Rows (showing up to {} rows):", sample);
                match writer.read_table(&file, Some(sample)) {
                    Ok(table) => {
                        for (row, timestamp) in table.timestamps().iter().enumerate() {
                            let traffic = table.absolute.get(Metric::Traffic)[row];
                            let normalized = table.normalized.get(Metric::Traffic)[row];
                            println!(
                                "{}. {}: traffic={}, traffic_norm={}, working_sensors={}",
                                row + 1,
                                timestamp,
                                format_optional(traffic),
                                format_optional(normalized),
                                table.working_sensors[row]
                            );
                        }
                    }
                    Err(e) => println!("Error reading sample data: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}

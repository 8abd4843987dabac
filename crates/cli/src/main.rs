use clap::{Parser, Subcommand};
use fhirhub_core::constants::{DEFAULT_UTC_OFFSET_ENV, LOOKUP_TIMEOUT_ENV, TERMINOLOGY_SNAPSHOT_ENV};
use fhirhub_core::{
    lookup_timeout_from_env_value, snapshot_path_from_env_value, utc_offset_from_env_value,
    ConvertOptions, CoreConfig,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod batch;

#[derive(Parser)]
#[command(name = "fhirhub")]
#[command(about = "HL7 v2.5 to FHIR R4 converter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one message to a FHIR transaction Bundle
    Convert {
        /// HL7 v2 message file
        file: PathBuf,
        /// Report codes the terminology backend does not know
        #[arg(long)]
        validate_terminology: bool,
        /// Terminology snapshot (JSON), overrides FHIRHUB_TERMINOLOGY_SNAPSHOT
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Write the Bundle here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Convert every message file in a directory
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,
        /// File extensions to pick up (repeatable)
        #[arg(long = "ext", default_values_t = batch::DEFAULT_EXTENSIONS.map(String::from))]
        extensions: Vec<String>,
        #[arg(long)]
        validate_terminology: bool,
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print the tokenized message as JSON
    Parse {
        file: PathBuf,
    },
    /// List the built-in code systems
    Systems,
}

/// Startup configuration from the environment, with `snapshot` taking precedence.
fn load_config(snapshot: Option<PathBuf>) -> anyhow::Result<CoreConfig> {
    let snapshot = match snapshot {
        Some(path) => Some(path),
        None => snapshot_path_from_env_value(std::env::var(TERMINOLOGY_SNAPSHOT_ENV).ok())?,
    };
    let timeout = lookup_timeout_from_env_value(std::env::var(LOOKUP_TIMEOUT_ENV).ok())?;
    let offset = utc_offset_from_env_value(std::env::var(DEFAULT_UTC_OFFSET_ENV).ok())?;
    Ok(CoreConfig::new(snapshot, timeout, offset)?)
}

/// Default log levels, one per workspace crate that emits events (binaries log as `fhirhub`).
const LOG_DIRECTIVES: [&str; 3] = ["fhirhub=info", "hl7=info", "terminology=warn"];

fn log_filter(filter: EnvFilter) -> anyhow::Result<EnvFilter> {
    LOG_DIRECTIVES
        .iter()
        .try_fold(filter, |filter, directive| -> anyhow::Result<EnvFilter> {
            Ok(filter.add_directive(directive.parse()?))
        })
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter(EnvFilter::from_default_env())?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            file,
            validate_terminology,
            snapshot,
            output,
            compact,
        } => {
            let config = load_config(snapshot)?;
            let engine = config.build_engine()?;
            let options = config.convert_options().with_validation(validate_terminology);

            let raw = fs::read_to_string(&file)?;
            let conversion = engine.convert(&raw, &options)?;
            for diagnostic in &conversion.diagnostics {
                tracing::warn!("{diagnostic}");
            }

            let json = if compact {
                conversion.bundle.to_json()?
            } else {
                conversion.to_json_pretty()?
            };
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    tracing::info!(output = %path.display(), "bundle written");
                }
                None => println!("{json}"),
            }
        }
        Commands::Batch {
            input_dir,
            output_dir,
            extensions,
            validate_terminology,
            snapshot,
        } => {
            let config = load_config(snapshot)?;
            let engine = config.build_engine()?;
            let options: ConvertOptions =
                config.convert_options().with_validation(validate_terminology);

            let summary = batch::run(&engine, &options, &input_dir, &output_dir, &extensions)?;
            for (path, reason) in &summary.failed {
                eprintln!("failed: {}: {reason}", path.display());
            }
            println!(
                "converted: {}, failed: {}",
                summary.converted,
                summary.failed.len()
            );
        }
        Commands::Parse { file } => {
            let raw = fs::read_to_string(&file)?;
            let message = hl7::ParsedMessage::parse(&raw)?;
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        Commands::Systems => {
            let table = terminology::CodeSystemTable::builtin();
            for entry in table.entries() {
                match &entry.oid {
                    Some(oid) => println!("{}\t{}\t{}", entry.local_key, entry.canonical_uri, oid),
                    None => println!("{}\t{}", entry.local_key, entry.canonical_uri),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_covers_every_library_crate() {
        let filter = log_filter(EnvFilter::new("")).expect("directives parse");
        let rendered = filter.to_string();
        for directive in ["fhirhub=info", "hl7=info", "terminology=warn"] {
            assert!(rendered.contains(directive), "{directive} missing from {rendered}");
        }
    }
}

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sdsp_asm::model::{write_outputs, DiagnosticOut, Report};
use sdsp_rs::encode_program;
use sdsp_rs::loader::{load_config, load_program};

#[derive(Parser, Debug)]
#[command(author, version, about = "SDSP encoder: program list in, .bin/.lst/.mem out", long_about = None)]
struct Cli {
    /// Program list: .json or assembly text
    #[arg(value_name = "PROGRAM")]
    input: PathBuf,
    /// Output path without extension (default: next to the input)
    #[arg(short, long, value_name = "STEM")]
    out: Option<PathBuf>,
    /// Machine configuration (JSON); only `delay_slots` matters here
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Diagnostics format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    let mut prog = load_program(&cli.input)?;
    let mut diags = prog.resolve(cfg.delay_slots);
    let enc = encode_program(&prog);
    // resolution problems resurface as encoding errors on the same record
    diags.retain(|d| !enc.diagnostics.iter().any(|e| e.line == d.line));
    diags.extend(enc.diagnostics.iter().cloned());

    let stem = cli.out.unwrap_or_else(|| cli.input.with_extension(""));
    let written = write_outputs(&stem, &enc)?;

    match cli.format {
        OutputFormat::Text => {
            for d in &diags {
                eprintln!("{:?}: {d}", d.kind);
            }
            for p in &written {
                println!("wrote {}", p.display());
            }
        }
        OutputFormat::Json => {
            let report = Report {
                words: enc.words.len(),
                errors: enc.errors,
                diagnostics: diags.iter().map(DiagnosticOut::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    anyhow::ensure!(enc.errors == 0, "{} instruction(s) failed to encode", enc.errors);
    Ok(())
}

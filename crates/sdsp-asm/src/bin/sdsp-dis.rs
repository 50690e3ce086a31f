use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sdsp_asm::model::{load_bin, read_word};
use sdsp_rs::disasm::{decode_word, fmt_decoded};

fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let r = if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(h, 16)
    } else {
        s.parse::<u32>()
    };
    r.map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "SDSP disassembler for encoder .bin output", long_about = None)]
struct Cli {
    #[arg(value_name = "BIN")]
    input: PathBuf,
    /// Program address of the first word (hex with 0x or decimal)
    #[arg(short, long, default_value = "0", value_parser = parse_u32)]
    base: u32,
    /// Number of words to show (default: all)
    #[arg(short, long)]
    count: Option<u32>,
    /// Output file (default: stdout)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let img = load_bin(&cli.input, cli.base)?;
    anyhow::ensure!(!img.words.is_empty(), "{} holds no words", cli.input.display());

    let count = cli.count.unwrap_or(img.words.len() as u32);
    let mut out: Box<dyn Write> = match &cli.out {
        Some(p) => Box::new(std::fs::File::create(p)?),
        None => Box::new(std::io::stdout()),
    };
    let mut unknown = 0usize;
    for addr in cli.base..cli.base.saturating_add(count) {
        let Some(word) = read_word(&img, addr) else { break };
        match decode_word(word, addr) {
            Some(d) => writeln!(out, "{addr:04X}: {word:08X}  {}", fmt_decoded(&d))?,
            None => {
                unknown += 1;
                writeln!(out, "{addr:04X}: {word:08X}  .word 0x{word:08X}")?
            }
        }
    }
    if unknown > 0 {
        tracing::warn!(unknown, "words did not decode");
    }
    Ok(())
}

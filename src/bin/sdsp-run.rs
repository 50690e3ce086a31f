use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sdsp_rs::loader::{load_config, load_program};
use sdsp_rs::sim::Command;
use sdsp_rs::{DataBus, RunOutcome, Simulator};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run an SDSP program on the SIMD execution engine"
)]
struct Opts {
    /// Machine configuration (JSON); defaults apply to missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Data memory init file, one address per line
    #[arg(long, value_name = "FILE")]
    init: Option<PathBuf>,
    /// First address the init file is loaded at
    #[arg(long, default_value_t = 0u32)]
    init_base: u32,
    /// Dump this many data words after the run
    #[arg(long, value_name = "COUNT")]
    dump: Option<u32>,
    #[arg(long, default_value_t = 0u32)]
    dump_base: u32,
    /// Step cap, overriding the configuration
    #[arg(long)]
    max_steps: Option<u64>,
    /// Interactive stepper (c, s, b <addr>, d <addr>, m <addr>, q)
    #[arg(short, long)]
    interactive: bool,
    /// Program list: .json or assembly text
    #[arg(value_name = "PROGRAM")]
    input: PathBuf,
}

fn stepper(sim: &mut Simulator) -> Result<()> {
    let stdin = std::io::stdin();
    let mut out = std::io::stdout();
    loop {
        match sim.pc_addr() {
            Some(a) => write!(out, "{a:04X}> ")?,
            None => write!(out, "----> ")?,
        }
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        let cmd: Command = match line.parse() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        let mut text = String::new();
        let more = sim.command(cmd, &mut text);
        print!("{text}");
        if !more {
            return Ok(());
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let mut cfg = load_config(opts.config.as_deref())?;
    if let Some(n) = opts.max_steps {
        cfg.max_steps = n;
    }
    let prog = load_program(&opts.input)?;
    let mut sim = Simulator::new(prog, cfg);

    if let Some(path) = &opts.init {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let n = sim.mem.load_init(opts.init_base, &text)?;
        tracing::info!(words = n, base = opts.init_base, "loaded data memory");
    }

    if opts.interactive {
        stepper(&mut sim)?;
    } else {
        match sim.run() {
            RunOutcome::Finished => {}
            RunOutcome::StepLimit => eprintln!("stopped after {} steps", sim.steps),
            RunOutcome::Breakpoint(a) => eprintln!("breakpoint at {a:04X}"),
        }
    }

    for d in &sim.diagnostics {
        eprintln!("{:?}: {d}", d.kind);
    }
    println!("steps {} cycles {}", sim.steps, sim.cycles());
    if let Some(count) = opts.dump {
        let count = count.min(sim.mem.words().saturating_sub(opts.dump_base));
        print!("{}", sim.mem.dump(opts.dump_base, count));
    }
    Ok(())
}

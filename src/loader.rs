//! Reading programs and machine configuration from disk.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cpu::MachineConfig;
use crate::record::{Program, ProgramBuilder};

/// Loads a program list: `.json` files hold a serialized [`Program`],
/// anything else is read as assembly text, one operation per line.
pub fn load_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|e| e == "json") {
        return serde_json::from_str(&text)
            .with_context(|| format!("parsing program {}", path.display()));
    }
    parse_program(&text)
}

/// Builds a program from assembly text, reporting the failing line.
pub fn parse_program(text: &str) -> Result<Program> {
    let mut b = ProgramBuilder::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        b.asm(line).with_context(|| format!("line {}: `{}`", n + 1, line.trim()))?;
    }
    Ok(b.build())
}

/// Reads a JSON [`MachineConfig`]; missing keys keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<MachineConfig> {
    let Some(p) = path else {
        return Ok(MachineConfig::default());
    };
    let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", p.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_keys_default() {
        let cfg: MachineConfig = serde_json::from_str(r#"{ "delay_slots": true }"#).unwrap();
        assert!(cfg.delay_slots);
        assert_eq!(cfg.stack_depth, 8);
    }

    #[test]
    fn assembly_errors_name_the_line() {
        let err = parse_program("NOP\nFROB R1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert_eq!(parse_program("NOP\n\nNOP\n").unwrap().records.len(), 2);
    }
}

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::error::AddressError;
use crate::lanes::{merge, sign_extend, LaneMask, Sint, LANES, WORD_BITS};

/// Data memory as seen by the execution engine: one 12-bit word per lane
/// at every address.
pub trait DataBus {
    fn words(&self) -> u32;
    fn read(&self, addr: u32) -> Result<Sint, AddressError>;
    /// Writes only the lanes set in `mask`.
    fn write(&mut self, addr: u32, val: Sint, mask: LaneMask) -> Result<(), AddressError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<Sint>,
}

impl LinearMemory {
    pub fn new(words: usize) -> Self {
        Self { mem: vec![[0; LANES]; words] }
    }

    fn slot(&self, addr: u32) -> Result<usize, AddressError> {
        let a = addr as usize;
        if a < self.mem.len() {
            Ok(a)
        } else {
            Err(AddressError::OutOfRange { addr })
        }
    }

    /// Decimal dump, one line per address with the four lane values.
    pub fn dump(&self, from: u32, count: u32) -> String {
        let mut out = String::new();
        for addr in from..from.saturating_add(count) {
            let Ok(v) = self.read(addr) else { break };
            let line: Vec<String> = v.iter().map(|x| x.to_string()).collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    /// Loads an init file of the same shape as [`LinearMemory::dump`],
    /// starting at `base`. Blank lines and `#` comments are skipped.
    pub fn load_init(&mut self, base: u32, text: &str) -> Result<u32> {
        let mut addr = base;
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let vals = line
                .split_whitespace()
                .map(|t| t.parse::<i32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("init line {}", n + 1))?;
            let lanes: Sint = match vals.as_slice() {
                [v] => [*v; LANES],
                [a, b, c, d] => [*a, *b, *c, *d],
                _ => bail!("init line {}: expected 1 or {LANES} values", n + 1),
            };
            self.write(addr, lanes, LaneMask::ALL)
                .with_context(|| format!("init line {}", n + 1))?;
            addr += 1;
        }
        Ok(addr - base)
    }
}

impl DataBus for LinearMemory {
    fn words(&self) -> u32 {
        self.mem.len() as u32
    }

    fn read(&self, addr: u32) -> Result<Sint, AddressError> {
        Ok(self.mem[self.slot(addr)?])
    }

    fn write(&mut self, addr: u32, val: Sint, mask: LaneMask) -> Result<(), AddressError> {
        let a = self.slot(addr)?;
        let val = val.map(|v| sign_extend(v, WORD_BITS));
        self.mem[a] = merge(self.mem[a], val, mask);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_dump_share_a_shape() {
        let mut m = LinearMemory::new(16);
        let n = m.load_init(4, "# coeffs\n1 2 3 4\n-5\n").unwrap();
        assert_eq!(n, 2);
        assert_eq!(m.dump(4, 2), "1 2 3 4\n-5 -5 -5 -5\n");
        assert!(m.load_init(15, "1\n2\n").is_err());
    }

    #[test]
    fn writes_wrap_and_respect_mask() {
        let mut m = LinearMemory::new(4);
        m.write(1, [0xFFF, 4096, 7, 7], LaneMask::from_bits(0b0011)).unwrap();
        assert_eq!(m.read(1), Ok([-1, 0, 0, 0]));
        assert_eq!(m.read(4), Err(AddressError::OutOfRange { addr: 4 }));
    }
}

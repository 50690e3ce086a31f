//! Simulator: program, machine state, data memory and the step loop.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::control::Controller;
use crate::cpu::{MachineConfig, MachineState};
use crate::error::{AddressError, Diagnostic, DiagnosticKind, ExecError};
use crate::exec::{commit, Effects, Executor, TableExecutor};
use crate::memory::{DataBus, LinearMemory};
use crate::record::Program;

/// Why [`Simulator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Execution ran off the end of the program.
    Finished,
    /// Stopped in front of the word at this address.
    Breakpoint(u32),
    StepLimit,
}

pub struct Simulator {
    pub prog: Program,
    pub state: MachineState,
    pub mem: LinearMemory,
    pub cfg: MachineConfig,
    pub breakpoints: BTreeSet<u32>,
    pub diagnostics: Vec<Diagnostic>,
    pub steps: u64,
    ctl: Controller,
    exec: TableExecutor,
    pc: Option<usize>,
}

impl Simulator {
    /// Resolves `prog` and positions the simulator on its first word.
    pub fn new(mut prog: Program, cfg: MachineConfig) -> Self {
        let diagnostics = prog.resolve(cfg.delay_slots);
        let ctl = Controller::new(&prog, &cfg);
        let pc = prog.records.iter().position(|r| !r.is_pseudo());
        Self {
            state: MachineState::new(&cfg),
            mem: LinearMemory::new(cfg.data_words),
            breakpoints: BTreeSet::new(),
            diagnostics,
            steps: 0,
            ctl,
            exec: TableExecutor,
            pc,
            prog,
            cfg,
        }
    }

    /// Index of the record about to execute.
    pub fn pc(&self) -> Option<usize> {
        self.pc
    }

    /// Program address of the record about to execute.
    pub fn pc_addr(&self) -> Option<u32> {
        self.pc.map(|i| self.prog.records[i].program_addr)
    }

    pub fn cycles(&self) -> u64 {
        self.ctl.cycles
    }

    /// Executes one record (with its bundle) and returns the next index.
    pub fn step(&mut self) -> Option<usize> {
        let idx = self.pc?;
        let rec = &self.prog.records[idx];
        let before = self.state.stacks.faults();
        let fx = match self.exec.exec(&self.state, &self.mem, &self.prog, rec) {
            Ok(fx) => fx,
            Err(e) => {
                tracing::warn!(line = rec.line, "{e}");
                self.diagnostics.push(rec.exec_diagnostic(&e));
                Effects::none()
            }
        };
        for e in &fx.faults {
            self.diagnostics.push(rec.exec_diagnostic(e));
        }
        for e in commit(&mut self.state, &mut self.mem, &fx) {
            self.diagnostics.push(rec.exec_diagnostic(&e));
        }
        let line = rec.line;
        let adv = self.ctl.advance(&mut self.state, &self.prog, idx, fx.flow);
        for (name, overflow) in self.state.stacks.faults() {
            if before.contains(&(name, overflow)) {
                continue;
            }
            let what = if overflow { "overflow" } else { "underflow" };
            let rec = &self.prog.records[idx];
            tracing::warn!(line, stack = name, "{what}");
            self.diagnostics.push(rec.diagnostic(
                DiagnosticKind::StackDiscipline,
                name.to_string(),
                format!("{name} stack {what}"),
            ));
        }
        if let Some(addr) = adv.missing {
            let e = ExecError::Address(AddressError::NoWord { addr });
            let rec = &self.prog.records[idx];
            tracing::warn!(line, "{e}");
            self.diagnostics.push(rec.exec_diagnostic(&e));
        }
        let rec = &mut self.prog.records[idx];
        rec.latency = adv.latency;
        rec.latency_added = adv.latency_added;
        tracing::debug!(line, addr = rec.program_addr, latency = adv.latency, "step");
        self.steps += 1;
        self.pc = adv.next;
        self.pc
    }

    /// Runs until the program ends, a breakpoint is reached or the step
    /// cap is hit. The word at the current position always executes, so a
    /// run resumed at a breakpoint moves past it.
    pub fn run(&mut self) -> RunOutcome {
        let mut budget = self.cfg.max_steps;
        loop {
            if budget == 0 {
                return RunOutcome::StepLimit;
            }
            budget -= 1;
            let Some(next) = self.step() else {
                return RunOutcome::Finished;
            };
            let addr = self.prog.records[next].program_addr;
            if self.breakpoints.contains(&addr) {
                return RunOutcome::Breakpoint(addr);
            }
        }
    }

    /// 16 rows of two addresses with four lane values each.
    pub fn dump_grid(&self, base: u32) -> String {
        let mut out = String::new();
        for row in 0..16 {
            let a = base + 2 * row;
            let cells: Vec<String> = [a, a + 1]
                .iter()
                .map(|&addr| match self.mem.read(addr) {
                    Ok(v) => v.iter().map(|x| format!("{x:>5}")).collect::<Vec<_>>().join(" "),
                    Err(_) => ["    -"; 4].join(" "),
                })
                .collect();
            let _ = writeln!(out, "{a:04X}: {}", cells.join("  "));
        }
        out
    }

    /// Interprets one stepper command. Returns false on quit.
    pub fn command(&mut self, cmd: Command, out: &mut String) -> bool {
        match cmd {
            Command::Continue => {
                let o = self.run();
                let _ = writeln!(out, "{o:?} after {} steps", self.steps);
            }
            Command::Step => match self.step() {
                Some(i) => {
                    let _ = writeln!(out, "{:04X} {}", self.prog.records[i].program_addr, self.prog.records[i]);
                }
                None => out.push_str("finished\n"),
            },
            Command::Break(a) => {
                self.breakpoints.insert(a);
            }
            Command::Delete(a) => {
                self.breakpoints.remove(&a);
            }
            Command::Dump(a) => out.push_str(&self.dump_grid(a)),
            Command::Quit => return false,
        }
        true
    }
}

/// Interactive stepper commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Continue,
    Step,
    Break(u32),
    Delete(u32),
    Dump(u32),
    Quit,
}

fn parse_addr(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let r = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(h) => u32::from_str_radix(h, 16),
        None => u32::from_str_radix(t, 16),
    };
    r.map_err(|e| format!("bad address `{t}`: {e}"))
}

impl FromStr for Command {
    type Err = String;

    /// Addresses are hexadecimal, with or without `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut it = s.split_whitespace();
        let head = it.next().ok_or_else(|| "empty command".to_string())?;
        let mut addr = || it.next().ok_or_else(|| format!("`{head}` needs an address")).and_then(parse_addr);
        Ok(match head {
            "c" => Command::Continue,
            "s" => Command::Step,
            "b" => Command::Break(addr()?),
            "d" => Command::Delete(addr()?),
            "m" => Command::Dump(addr()?),
            "q" => Command::Quit,
            _ => return Err(format!("unknown command `{head}`")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!("c".parse(), Ok(Command::Continue));
        assert_eq!("b 0x1f".parse(), Ok(Command::Break(0x1F)));
        assert_eq!("m 100".parse(), Ok(Command::Dump(0x100)));
        assert!("b".parse::<Command>().is_err());
        assert!("x 1".parse::<Command>().is_err());
    }
}

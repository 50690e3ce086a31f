//! Program sequencer: picks the next record and accounts latency.
//!
//! The controller owns nothing architectural. The return, loop and status
//! stacks live in [`MachineState`]; the controller only remembers a branch
//! waiting out its delay slot and what the last executed word did to memory.

use std::collections::HashMap;

use crate::cpu::{MachineConfig, MachineState};
use crate::exec::Flow;
use crate::operand::{Condition, Operand};
use crate::record::Program;
use crate::stack::{LoopFrame, StatusFrame};

/// Outcome of one sequencing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Index of the next record, `None` when execution leaves the program.
    pub next: Option<usize>,
    pub latency: u32,
    /// Stall cycles included in `latency`.
    pub latency_added: u32,
    /// The innermost loop went round again.
    pub looped: bool,
    /// A transfer target with no word behind it; execution fell through.
    pub missing: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Controller {
    index: HashMap<u32, usize>,
    delay_slots: bool,
    pending: Option<u32>,
    prev_wrote_mem: bool,
    pub cycles: u64,
}

impl Controller {
    pub fn new(prog: &Program, cfg: &MachineConfig) -> Self {
        Self {
            index: prog.addr_index(),
            delay_slots: cfg.delay_slots,
            pending: None,
            prev_wrote_mem: false,
            cycles: 0,
        }
    }

    /// Record index of the word at a program address.
    pub fn index_of(&self, addr: u32) -> Option<usize> {
        self.index.get(&addr).copied()
    }

    fn branch(&mut self, target: u32, redirect: &mut Option<u32>) {
        if self.delay_slots {
            self.pending = Some(target);
        } else {
            *redirect = Some(target);
        }
    }

    /// Termination condition of the loop whose body starts at `begin`,
    /// read back from its DO word.
    fn loop_term(&self, prog: &Program, begin: u32) -> Condition {
        begin
            .checked_sub(1)
            .and_then(|a| self.index_of(a))
            .and_then(|i| match prog.records[i].operands.get(1) {
                Some(Operand::Cond(c)) => Some(*c),
                _ => None,
            })
            .unwrap_or(Condition::Ce)
    }

    /// Applies the control effect of record `idx` and returns where to go.
    pub fn advance(
        &mut self,
        st: &mut MachineState,
        prog: &Program,
        idx: usize,
        flow: Option<Flow>,
    ) -> Advance {
        let rec = &prog.records[idx];
        let addr = rec.program_addr;
        let mut redirect = None;
        if rec.is_delay_slot {
            redirect = self.pending.take();
        }
        match flow {
            Some(Flow::Jump(t)) => self.branch(t, &mut redirect),
            Some(Flow::Call(t)) => {
                let ret = if self.delay_slots { addr + 2 } else { addr + 1 };
                st.stacks.pc.push(ret);
                self.branch(t, &mut redirect);
            }
            Some(Flow::Return) => {
                // an empty return stack falls through
                if let Some(r) = st.stacks.pc.pop() {
                    self.branch(r, &mut redirect);
                }
            }
            Some(Flow::Do { end, term }) => {
                st.stacks.push_loop(LoopFrame {
                    begin: addr + 1,
                    end,
                    count: st.cntr,
                    forever: term == Condition::Forever,
                });
            }
            Some(Flow::PushStatus) => {
                let frame = StatusFrame {
                    re: st.flags.map(|f| f.re),
                    im: st.flags.map(|f| f.im),
                    cplx: st.flags.map(|f| f.cplx),
                    mode: st.mstat,
                };
                st.stacks.push_status(frame);
            }
            Some(Flow::PopStatus) => {
                if let Some(f) = st.stacks.pop_status() {
                    for (l, fb) in st.flags.iter_mut().enumerate() {
                        fb.re = f.re[l];
                        fb.im = f.im[l];
                        fb.cplx = f.cplx[l];
                    }
                    st.mstat = f.mode;
                }
            }
            Some(Flow::Reset) => {
                st.reset();
                self.pending = None;
            }
            None => {}
        }

        let mut looped = false;
        if redirect.is_none() {
            while let Some(top) = st.stacks.top_loop() {
                if top.end != addr {
                    break;
                }
                let done = !top.forever && st.cond_lane(self.loop_term(prog, top.begin), 0);
                if done {
                    // an enclosing loop may end on the same word
                    st.stacks.pop_loop();
                    if let Some(outer) = st.stacks.top_loop() {
                        st.cntr = outer.count;
                    }
                    continue;
                }
                // CNTR follows the active loop's count
                st.stacks.decrement_loop();
                st.cntr = top.count.wrapping_sub(1);
                redirect = Some(top.begin);
                looped = true;
                break;
            }
        }

        let mut missing = None;
        let next = match redirect.map(|t| (t, self.index_of(t))) {
            Some((_, Some(i))) => Some(i),
            Some((t, None)) => {
                missing = Some(t);
                looped = false;
                prog.next_word(idx)
            }
            None => prog.next_word(idx),
        };

        let mut added = 0;
        if rec.reads_memory() && self.prev_wrote_mem {
            added += 1;
        }
        if rec.is_mac_word() {
            let successor = if looped { next } else { prog.next_word(idx) };
            if !successor.is_some_and(|s| prog.records[s].is_mac_word()) {
                added += 1;
            }
        }
        self.prev_wrote_mem = rec.writes_memory();
        let latency = 1 + added;
        self.cycles += latency as u64;
        tracing::trace!(addr, ?redirect, looped, latency, "advance");
        Advance { next, latency, latency_added: added, looped, missing }
    }
}

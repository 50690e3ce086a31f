//! Execution engine.
//!
//! Every record is executed in two phases. Handlers only read machine
//! state and describe what they want written as [`Effects`]; [`commit`]
//! applies them afterwards through the lane mask. A bundle computes the
//! effects of all its members before any of them is committed, so siblings
//! never observe each other's writes.

mod alu;
mod complex;
mod mac;
mod mem;
mod seq;
mod shift;

use crate::cpu::{Flags, MachineState, Mstat};
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{self, Member};
use crate::lanes::{LaneMask, Sint, LANES};
use crate::memory::DataBus;
use crate::operand::{AccPart, Condition, Reg, SysReg};
use crate::record::{InstructionRecord, Program};

/// Flag bank a flag update goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Re,
    Im,
    Cplx,
}

/// One deferred state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Reg(u8, Sint),
    Acc(u8, Sint),
    AccPart(u8, AccPart, Sint),
    /// Shared registers take the lane 0 value.
    Dag(Reg, i32),
    Sys(SysReg, i32),
    Mem(u32, Sint),
    Flags { bank: Bank, group: Flags, value: [Flags; LANES] },
    Mode { bits: Mstat, on: bool },
}

/// Control transfer requested by a sequencer instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Jump(u32),
    Call(u32),
    Return,
    Do { end: u32, term: Condition },
    PushStatus,
    PopStatus,
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub writes: Vec<Write>,
    pub flow: Option<Flow>,
    /// Accesses that were skipped; the rest of the instruction stands.
    pub faults: Vec<ExecError>,
    pub mask: LaneMask,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn write(mut self, w: Write) -> Self {
        self.writes.push(w);
        self
    }

    pub fn reg(self, idx: u8, v: Sint) -> Self {
        self.write(Write::Reg(idx, v))
    }

    pub fn flags(self, bank: Bank, group: Flags, value: [Flags; LANES]) -> Self {
        self.write(Write::Flags { bank, group, value })
    }

    pub fn flow(mut self, f: Flow) -> Self {
        self.flow = Some(f);
        self
    }

    pub fn fault(mut self, e: impl Into<ExecError>) -> Self {
        self.faults.push(e.into());
        self
    }

    fn absorb(&mut self, other: Effects) {
        self.writes.extend(other.writes);
        self.faults.extend(other.faults);
        if other.flow.is_some() {
            self.flow = other.flow;
        }
    }

    pub fn writes_memory(&self) -> bool {
        self.writes.iter().any(|w| matches!(w, Write::Mem(..)))
    }
}

/// Read-only view handed to every handler.
pub struct Ctx<'a> {
    pub st: &'a MachineState,
    pub bus: &'a dyn DataBus,
    pub prog: &'a Program,
    pub mask: LaneMask,
}

impl Ctx<'_> {
    /// Lane 0 decides anything shared: DAG registers, modes, control flow.
    pub fn lane0(&self) -> bool {
        self.mask.is_set(0)
    }

    pub fn sat(&self) -> bool {
        self.st.mstat.contains(Mstat::ALU_SAT)
    }

    pub fn flags(&self, lane: usize) -> Flags {
        self.st.flags[lane].re
    }
}

pub type Handler = fn(&Ctx, &Member) -> Result<Effects, ExecError>;

const HANDLERS: &[(Opcode, Handler)] = &[
    (Opcode::Add, alu::arith),
    (Opcode::Adc, alu::arith),
    (Opcode::Sub, alu::arith),
    (Opcode::Sbc, alu::arith),
    (Opcode::And, alu::arith),
    (Opcode::Or, alu::arith),
    (Opcode::Xor, alu::arith),
    (Opcode::Min, alu::arith),
    (Opcode::Max, alu::arith),
    (Opcode::Not, alu::unary),
    (Opcode::Neg, alu::unary),
    (Opcode::Abs, alu::unary),
    (Opcode::Pass, alu::unary),
    (Opcode::Inc, alu::unary),
    (Opcode::Dec, alu::unary),
    (Opcode::Exp, alu::unary),
    (Opcode::Clr, alu::clear),
    (Opcode::Cmp, alu::compare),
    (Opcode::Divs, alu::divide),
    (Opcode::Divq, alu::divide),
    (Opcode::Setb, alu::bits),
    (Opcode::Clrb, alu::bits),
    (Opcode::Tglb, alu::bits),
    (Opcode::Tstb, alu::bits),
    (Opcode::Lsl, shift::shift),
    (Opcode::Lsr, shift::shift),
    (Opcode::Asr, shift::shift),
    (Opcode::Rol, shift::shift),
    (Opcode::Mpy, mac::multiply),
    (Opcode::Mac, mac::multiply),
    (Opcode::Mas, mac::multiply),
    (Opcode::Sat, mac::acc_op),
    (Opcode::Rnd, mac::acc_op),
    (Opcode::Conj, complex::unary),
    (Opcode::Polar, complex::cordic),
    (Opcode::Rect, complex::cordic),
    (Opcode::Ld, mem::load),
    (Opcode::St, mem::store),
    (Opcode::Mov, mem::mov),
    (Opcode::Modify, mem::modify),
    (Opcode::Jump, seq::branch),
    (Opcode::Call, seq::branch),
    (Opcode::Rts, seq::branch),
    (Opcode::Do, seq::do_loop),
    (Opcode::Push, seq::status),
    (Opcode::Pop, seq::status),
    (Opcode::Ena, seq::mode),
    (Opcode::Dis, seq::mode),
    (Opcode::Nop, seq::nop),
    (Opcode::Idle, seq::nop),
    (Opcode::Reset, seq::reset),
];

pub fn handler(op: Opcode) -> Option<Handler> {
    HANDLERS.iter().find(|(o, _)| *o == op).map(|(_, h)| *h)
}

pub trait Executor {
    fn exec<B: DataBus>(
        &self,
        st: &MachineState,
        bus: &B,
        prog: &Program,
        rec: &InstructionRecord,
    ) -> Result<Effects, ExecError>;
}

/// Dispatches through [`HANDLERS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TableExecutor;

impl Executor for TableExecutor {
    fn exec<B: DataBus>(
        &self,
        st: &MachineState,
        bus: &B,
        prog: &Program,
        rec: &InstructionRecord,
    ) -> Result<Effects, ExecError> {
        shape::check_structure(rec)?;
        let sel = shape::select(rec)?;
        let mask = st.condition_mask(rec.cond());
        let cx = Ctx { st, bus, prog, mask };
        let mut fx = Effects { mask, ..Effects::default() };
        for m in &sel.members {
            let h = handler(m.opcode()).ok_or_else(|| {
                ExecError::Shape(crate::error::ShapeError::NoFormat {
                    opcode: m.opcode(),
                    operands: crate::operand::render(&m.rec.operands),
                })
            })?;
            fx.absorb(h(&cx, m)?);
        }
        tracing::trace!(line = rec.line, writes = fx.writes.len(), mask = mask.bits(), "effects");
        Ok(fx)
    }
}

/// Applies effects through their lane mask.
///
/// Shared registers and modes change only when lane 0 is active. Memory
/// writes were range checked when the effects were built, so a failure here
/// is reported and skipped like any other addressing fault.
pub fn commit<B: DataBus>(st: &mut MachineState, bus: &mut B, fx: &Effects) -> Vec<ExecError> {
    let mask = fx.mask;
    let mut faults = Vec::new();
    for w in &fx.writes {
        match w {
            Write::Reg(i, v) => st.set_reg(*i, *v, mask),
            Write::Acc(i, v) => st.set_acc(*i, *v, mask),
            Write::AccPart(i, p, v) => st.set_acc_part(*i, *p, *v, mask),
            Write::Dag(r, v) if mask.is_set(0) => st.set_dag(*r, *v),
            Write::Sys(s, v) if mask.is_set(0) => st.set_sys(*s, *v),
            Write::Mode { bits, on } if mask.is_set(0) => st.mstat.set(*bits, *on),
            Write::Dag(..) | Write::Sys(..) | Write::Mode { .. } => {}
            Write::Mem(addr, v) => {
                if let Err(e) = bus.write(*addr, *v, mask) {
                    faults.push(e.into());
                }
            }
            Write::Flags { bank, group, value } => {
                for l in mask.lanes() {
                    let fb = &mut st.flags[l];
                    let target = match bank {
                        Bank::Re => &mut fb.re,
                        Bank::Im => &mut fb.im,
                        Bank::Cplx => &mut fb.cplx,
                    };
                    target.update(*group, value[l]);
                }
            }
        }
    }
    faults
}

/// Sets AZ and AN from a 12-bit result.
pub(crate) fn zn(f: &mut Flags, v: i32) {
    f.set(Flags::AZ, v == 0);
    f.set(Flags::AN, v < 0);
}

/// Applies `f` to every lane, collecting values and flags separately.
pub(crate) fn per_lane(mut f: impl FnMut(usize) -> (i32, Flags)) -> (Sint, [Flags; LANES]) {
    let mut v = [0; LANES];
    let mut fl = [Flags::empty(); LANES];
    for l in 0..LANES {
        let (a, b) = f(l);
        v[l] = a;
        fl[l] = b;
    }
    (v, fl)
}

pub(crate) fn shape_error(m: &Member) -> ExecError {
    ExecError::Shape(crate::error::ShapeError::NoFormat {
        opcode: m.opcode(),
        operands: crate::operand::render(&m.rec.operands),
    })
}

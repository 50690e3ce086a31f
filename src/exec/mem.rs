//! Loads, stores, register moves and DAG address generation.
//!
//! Every access resolves to one data address plus an optional update of
//! its index register. A faulting access is skipped; the index update
//! still happens.

use super::{shape_error, Ctx, Effects, Write};
use crate::cpu::Mstat;
use crate::error::{AddressError, ExecError};
use crate::isa::shape::{Member, Shape};
use crate::lanes::{sign_extend, Cplx, LANES, WORD_BITS};
use crate::operand::{AddrMode, Operand, Reg, RegClass};

/// Index registers subject to bit-reversed addressing.
const BIT_REV_REGS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub addr: u32,
    /// New value of I(n), if the mode modifies it.
    pub update: Option<(u8, u32)>,
}

impl Access {
    fn dag_write(&self) -> Option<Write> {
        self.update
            .map(|(i, v)| Write::Dag(Reg::new(RegClass::I, i), v as i32))
    }
}

/// Steps an index register, wrapping inside `[B, B+L)` when L is set.
pub fn step_index(index: u32, base: u32, len: u32, delta: i32) -> u32 {
    if len == 0 {
        return (index as i64 + delta as i64) as u32 & 0xFFFF;
    }
    let off = (index as i64 - base as i64 + delta as i64).rem_euclid(len as i64);
    (base as i64 + off) as u32 & 0xFFFF
}

fn bit_reverse(addr: u32) -> u32 {
    (addr as u16).reverse_bits() as u32
}

/// Resolves an addressing mode against the current DAG registers.
pub fn resolve(cx: &Ctx, mode: &AddrMode) -> Result<Access, ExecError> {
    let st = cx.st;
    let step = |i: u8, delta: i32| {
        let n = i as usize;
        step_index(st.i[n], st.b[n], st.l[n], delta)
    };
    let (addr, update, i) = match *mode {
        AddrMode::Direct(_) | AddrMode::Symbol(_) => {
            let a = cx.prog.data_addr(mode)?.unwrap_or(0);
            return Ok(Access { addr: a, update: None });
        }
        AddrMode::Post { i, m } => (st.i[i as usize], Some(step(i, st.m[m as usize])), i),
        AddrMode::Pre { i, m } => {
            let n = step(i, st.m[m as usize]);
            (n, Some(n), i)
        }
        AddrMode::PostImm { i, step: 0 } => (st.i[i as usize], None, i),
        AddrMode::PostImm { i, step: s } => (st.i[i as usize], Some(step(i, s)), i),
        AddrMode::PreImm { i, step: s } => {
            let n = step(i, s);
            (n, Some(n), i)
        }
    };
    let addr = if st.mstat.contains(Mstat::BIT_REV) && i < BIT_REV_REGS {
        bit_reverse(addr)
    } else {
        addr
    };
    Ok(Access { addr, update: update.map(|v| (i, v)) })
}

fn check(cx: &Ctx, addr: u32, complex: bool) -> Result<(), AddressError> {
    if complex && addr % 2 != 0 {
        return Err(AddressError::Unaligned { addr });
    }
    let last = addr.saturating_add(complex as u32);
    if last >= cx.bus.words() {
        return Err(AddressError::OutOfRange { addr: last });
    }
    Ok(())
}

fn target_reg(m: &Member) -> Result<Reg, ExecError> {
    m.data_reg().ok_or_else(|| shape_error(m))
}

/// LD: memory forms plus the immediate loads into R, DAG and system
/// registers.
pub(super) fn load(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    match m.shape {
        Shape::RImm => {
            let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
            let v = m.imm(1).ok_or_else(|| shape_error(m))? as i32;
            return Ok(Effects::none().reg(rd, [v; LANES]));
        }
        Shape::DagImm => {
            let r = m.reg(0).ok_or_else(|| shape_error(m))?;
            let v = m.imm(1).ok_or_else(|| shape_error(m))? as i32;
            return Ok(Effects::none().write(Write::Dag(r, v)));
        }
        Shape::SysImm => {
            let Some(Operand::Sys(s)) = m.rec.operands.first() else {
                return Err(shape_error(m));
            };
            let v = m.imm(1).ok_or_else(|| shape_error(m))? as i32;
            return Ok(Effects::none().write(Write::Sys(*s, v)));
        }
        _ => {}
    }
    let mref = m.mem().ok_or_else(|| shape_error(m))?;
    let rd = target_reg(m)?;
    let acc = resolve(cx, &mref.mode)?;
    let complex = rd.class == RegClass::Cr;
    let mut fx = Effects::none();
    if let Some(w) = acc.dag_write() {
        fx = fx.write(w);
    }
    if let Err(e) = check(cx, acc.addr, complex) {
        return Ok(fx.fault(e));
    }
    if complex {
        let hi = cx.bus.read(acc.addr)?;
        let lo = cx.bus.read(acc.addr + 1)?;
        let c: [Cplx; LANES] =
            std::array::from_fn(|l| Cplx::from_packed24((hi[l] << WORD_BITS) | (lo[l] & 0xFFF)));
        Ok(fx
            .reg(2 * rd.index, c.map(|c| c.re))
            .reg(2 * rd.index + 1, c.map(|c| c.im)))
    } else {
        let v = cx.bus.read(acc.addr)?;
        Ok(fx.reg(rd.index, v))
    }
}

pub(super) fn store(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let mref = m.mem().ok_or_else(|| shape_error(m))?;
    let rs = target_reg(m)?;
    let acc = resolve(cx, &mref.mode)?;
    let complex = rs.class == RegClass::Cr;
    let mut fx = Effects::none();
    if let Some(w) = acc.dag_write() {
        fx = fx.write(w);
    }
    if let Err(e) = check(cx, acc.addr, complex) {
        return Ok(fx.fault(e));
    }
    if complex {
        let packed = cx.st.creg(rs.index).map(|c| c.to_packed24());
        Ok(fx
            .write(Write::Mem(acc.addr, packed.map(|p| p >> WORD_BITS)))
            .write(Write::Mem(acc.addr + 1, packed.map(|p| sign_extend(p & 0xFFF, WORD_BITS)))))
    } else {
        Ok(fx.write(Write::Mem(acc.addr, cx.st.reg(rs.index))))
    }
}

/// MOV between general registers, accumulator views, DAG and system
/// registers. No flags change.
pub(super) fn mov(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let ops = &m.rec.operands;
    let (Some(dst), Some(src)) = (ops.first(), ops.get(1)) else {
        return Err(shape_error(m));
    };
    let fx = Effects::none();
    Ok(match (m.shape, dst, src) {
        (Shape::RR, Operand::Reg(d), Operand::Reg(s)) => fx.reg(d.index, cx.st.reg(s.index)),
        (Shape::RAccPart, Operand::Reg(d), Operand::AccPart(a, p)) => {
            fx.reg(d.index, cx.st.acc_part(*a, *p))
        }
        (Shape::AccPartR, Operand::AccPart(a, p), Operand::Reg(s)) => {
            fx.write(Write::AccPart(*a, *p, cx.st.reg(s.index)))
        }
        (Shape::RDag, Operand::Reg(d), Operand::Reg(s)) => {
            let v = sign_extend(cx.st.dag(*s) & 0xFFF, WORD_BITS);
            fx.reg(d.index, [v; LANES])
        }
        (Shape::DagR, Operand::Reg(d), Operand::Reg(s)) => {
            let v = cx.st.reg(s.index)[0];
            let v = if d.class == RegClass::M { v } else { v & 0xFFF };
            fx.write(Write::Dag(*d, v))
        }
        (Shape::RSys, Operand::Reg(d), Operand::Sys(s)) => fx.reg(d.index, cx.st.sys(*s)),
        (Shape::SysR, Operand::Sys(d), Operand::Reg(s)) => {
            fx.write(Write::Sys(*d, cx.st.reg(s.index)[0] & 0xFFF))
        }
        _ => return Err(shape_error(m)),
    })
}

/// MODIFY (Ii, Mm): steps the index register without an access.
pub(super) fn modify(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let i = m.reg(0).ok_or_else(|| shape_error(m))?;
    let mm = m.reg(1).ok_or_else(|| shape_error(m))?;
    let n = i.index as usize;
    let v = step_index(cx.st.i[n], cx.st.b[n], cx.st.l[n], cx.st.m[mm.index as usize]);
    Ok(Effects::none().write(Write::Dag(i, v as i32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_and_circular_steps() {
        assert_eq!(step_index(10, 0, 0, 3), 13);
        assert_eq!(step_index(0, 0, 0, -1), 0xFFFF);
        assert_eq!(step_index(0x107, 0x100, 8, 1), 0x100);
        assert_eq!(step_index(0x100, 0x100, 8, -1), 0x107);
        assert_eq!(step_index(0x102, 0x100, 8, 17), 0x103);
    }

    #[test]
    fn bit_reversal_is_sixteen_bits() {
        assert_eq!(bit_reverse(1), 0x8000);
        assert_eq!(bit_reverse(0x8000), 1);
        assert_eq!(bit_reverse(0x0003), 0xC000);
    }
}

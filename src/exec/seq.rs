use super::{shape_error, Ctx, Effects, Flow, Write};
use crate::cpu::Mstat;
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{Member, Shape};
use crate::operand::{Keyword, ModeBit, Operand};

/// Control flow is shared; lane 0 decides whether a conditional transfer
/// happens.
fn gated(cx: &Ctx, f: Flow) -> Effects {
    if cx.lane0() {
        Effects::none().flow(f)
    } else {
        Effects::none()
    }
}

/// JUMP/CALL to a label, an absolute address or `(Ii)`; RTS.
pub(super) fn branch(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let target = match (m.opcode(), m.shape) {
        (Opcode::Rts, Shape::Bare) => return Ok(gated(cx, Flow::Return)),
        (_, Shape::Target) => match m.rec.operands.first() {
            Some(Operand::Target(t)) => cx.prog.target_addr(t)?,
            _ => return Err(shape_error(m)),
        },
        (_, Shape::Index) => {
            let i = m.reg(0).ok_or_else(|| shape_error(m))?;
            cx.st.i[i.index as usize]
        }
        _ => return Err(shape_error(m)),
    };
    let flow = match m.opcode() {
        Opcode::Call => Flow::Call(target),
        _ => Flow::Jump(target),
    };
    Ok(gated(cx, flow))
}

/// DO end UNTIL term.
pub(super) fn do_loop(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let (Some(Operand::Target(t)), Some(Operand::Cond(term))) =
        (m.rec.operands.first(), m.rec.operands.get(1))
    else {
        return Err(shape_error(m));
    };
    let end = cx.prog.target_addr(t)?;
    Ok(gated(cx, Flow::Do { end, term: *term }))
}

pub(super) fn status(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    match m.opcode() {
        Opcode::Push => Ok(gated(cx, Flow::PushStatus)),
        Opcode::Pop => Ok(gated(cx, Flow::PopStatus)),
        _ => Err(shape_error(m)),
    }
}

fn mode_bits(b: ModeBit) -> Mstat {
    match b {
        ModeBit::AluSat => Mstat::ALU_SAT,
        ModeBit::MacSat => Mstat::MAC_SAT,
        ModeBit::BitRev => Mstat::BIT_REV,
    }
}

/// ENA/DIS of one MSTAT mode bit.
pub(super) fn mode(_cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let Some(Operand::Key(Keyword::Mode(b))) = m.rec.operands.first() else {
        return Err(shape_error(m));
    };
    Ok(Effects::none().write(Write::Mode {
        bits: mode_bits(*b),
        on: m.opcode() == Opcode::Ena,
    }))
}

/// NOP, and IDLE, which has nothing to wait for here.
pub(super) fn nop(_cx: &Ctx, _m: &Member) -> Result<Effects, ExecError> {
    Ok(Effects::none())
}

pub(super) fn reset(cx: &Ctx, _m: &Member) -> Result<Effects, ExecError> {
    Ok(gated(cx, Flow::Reset))
}

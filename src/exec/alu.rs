use super::{complex, mac, per_lane, shape_error, zn, Bank, Ctx, Effects};
use crate::cpu::Flags;
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{Member, Shape};
use crate::lanes::{fits_signed, saturate, sign_extend, LANES, WORD_BITS};

const MASK: i32 = 0xFFF;

/// Flags touched by ordinary ALU results.
pub(super) const ARITH: Flags = Flags::AZ
    .union(Flags::AN)
    .union(Flags::AV)
    .union(Flags::AC)
    .union(Flags::AS);

/// 12-bit add or subtract with carry in. For subtraction `cin` is the
/// inverted borrow, so AC reads "no borrow".
pub(super) fn add_sub(a: i32, b: i32, cin: bool, sub: bool, sat: bool) -> (i32, Flags) {
    let ub = if sub { !b & MASK } else { b & MASK };
    let sum = (a & MASK) + ub + cin as i32;
    let exact = if sub {
        a - b - (!cin) as i32
    } else {
        a + b + cin as i32
    };
    let mut f = Flags::empty();
    f.set(Flags::AC, sum > MASK);
    let overflow = !fits_signed(exact, WORD_BITS);
    f.set(Flags::AV, overflow);
    f.set(Flags::AS, a < 0);
    let v = if overflow && sat {
        saturate(exact, WORD_BITS).0
    } else {
        sign_extend(sum & MASK, WORD_BITS)
    };
    zn(&mut f, v);
    (v, f)
}

pub(super) fn logic(v: i32) -> (i32, Flags) {
    let v = sign_extend(v & MASK, WORD_BITS);
    let mut f = Flags::empty();
    zn(&mut f, v);
    (v, f)
}

fn binary(op: Opcode, a: i32, b: i32, carry: bool, sat: bool) -> (i32, Flags) {
    match op {
        Opcode::Add => add_sub(a, b, false, false, sat),
        Opcode::Adc => add_sub(a, b, carry, false, sat),
        Opcode::Sub => add_sub(a, b, true, true, sat),
        Opcode::Sbc => add_sub(a, b, carry, true, sat),
        Opcode::And => logic(a & b),
        Opcode::Or => logic(a | b),
        Opcode::Xor => logic(a ^ b),
        Opcode::Min => logic(a.min(b)),
        Opcode::Max => logic(a.max(b)),
        Opcode::Setb => logic(a | (1 << b)),
        Opcode::Clrb => logic(a & !(1 << b)),
        Opcode::Tglb => logic(a ^ (1 << b)),
        _ => (a, Flags::empty()),
    }
}

/// Redundant sign bits of a 12-bit value.
fn exponent(x: i32) -> i32 {
    let v = if x < 0 { !x } else { x } as u32;
    (WORD_BITS as i32 - 1) - (32 - v.leading_zeros()) as i32
}

/// Two and three operand forms: `Rd = Rs op Rt` and `Rd = Rs op #imm`.
pub(super) fn arith(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    match m.shape {
        Shape::CrCrCr => return complex::binary(cx, m),
        Shape::RRR | Shape::RRImm => {}
        _ => return Err(shape_error(m)),
    }
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let a = cx.st.reg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let b = match m.shape {
        Shape::RRImm => [m.imm(2).ok_or_else(|| shape_error(m))? as i32; LANES],
        _ => cx.st.reg(m.reg(2).ok_or_else(|| shape_error(m))?.index),
    };
    let op = m.opcode();
    let (v, f) = per_lane(|l| binary(op, a[l], b[l], cx.flags(l).contains(Flags::AC), cx.sat()));
    Ok(Effects::none().reg(rd, v).flags(Bank::Re, ARITH, f))
}

pub(super) fn unary(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    if m.shape == Shape::CrCr {
        return complex::unary(cx, m);
    }
    if m.shape != Shape::RR {
        return Err(shape_error(m));
    }
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let a = cx.st.reg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let sat = cx.sat();
    let op = m.opcode();
    let (v, f) = per_lane(|l| {
        let x = a[l];
        let (v, mut f) = match op {
            Opcode::Not => logic(!x),
            Opcode::Neg => add_sub(0, x, true, true, sat),
            Opcode::Abs if x < 0 => add_sub(0, x, true, true, sat),
            Opcode::Abs | Opcode::Pass => logic(x),
            Opcode::Inc => add_sub(x, 1, false, false, sat),
            Opcode::Dec => add_sub(x, 1, true, true, sat),
            Opcode::Exp => logic(exponent(x)),
            _ => (x, Flags::empty()),
        };
        f.set(Flags::AS, x < 0);
        (v, f)
    });
    Ok(Effects::none().reg(rd, v).flags(Bank::Re, ARITH, f))
}

/// CLR R clears a register; CLR ACCn belongs to the multiplier.
pub(super) fn clear(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    match m.shape {
        Shape::Acc => mac::acc_op(cx, m),
        Shape::R => {
            let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
            let (v, f) = per_lane(|_| logic(0));
            Ok(Effects::none().reg(rd, v).flags(Bank::Re, ARITH, f))
        }
        _ => Err(shape_error(m)),
    }
}

/// Flags of `Rs - Rt` (or `Rs - #imm`) without a result.
pub(super) fn compare(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let a = cx.st.reg(m.reg(0).ok_or_else(|| shape_error(m))?.index);
    let b = match m.shape {
        Shape::RR => cx.st.reg(m.reg(1).ok_or_else(|| shape_error(m))?.index),
        Shape::RImm => [m.imm(1).ok_or_else(|| shape_error(m))? as i32; LANES],
        _ => return Err(shape_error(m)),
    };
    let (_, f) = per_lane(|l| add_sub(a[l], b[l], true, true, false));
    Ok(Effects::none().flags(Bank::Re, ARITH, f))
}

/// SETB/CLRB/TGLB write `Rd`; TSTB only sets AZ when the bit is clear.
pub(super) fn bits(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    if m.opcode() == Opcode::Tstb {
        let a = cx.st.reg(m.reg(0).ok_or_else(|| shape_error(m))?.index);
        let bit = m.imm(1).ok_or_else(|| shape_error(m))?;
        let (_, f) = per_lane(|l| logic(a[l] & (1 << bit)));
        return Ok(Effects::none().flags(Bank::Re, ARITH, f));
    }
    arith(cx, m)
}

/// DIVS/DIVQ: one non-restoring division step on the pair `Rd:Rd+1`
/// (partial remainder : quotient) by `Rs`.
pub(super) fn divide(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let div = cx.st.reg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let rem = cx.st.reg(rd);
    let quo = cx.st.reg(rd + 1);
    let mut new_rem = [0; LANES];
    let mut new_quo = [0; LANES];
    let mut flags = [Flags::empty(); LANES];
    for l in 0..LANES {
        let msb = (quo[l] >> (WORD_BITS - 1)) & 1;
        let shifted = ((rem[l] << 1) | msb) & MASK;
        let aq = match m.opcode() {
            Opcode::Divs => {
                let aq = (rem[l] < 0) != (div[l] < 0);
                new_rem[l] = sign_extend(shifted, WORD_BITS);
                aq
            }
            _ => {
                let prev_aq = cx.flags(l).contains(Flags::AQ);
                let r = if prev_aq { shifted + div[l] } else { shifted - div[l] };
                let r = sign_extend(r & MASK, WORD_BITS);
                new_rem[l] = r;
                (r < 0) != (div[l] < 0)
            }
        };
        let qbit = match m.opcode() {
            Opcode::Divs => aq as i32,
            _ => (!aq) as i32,
        };
        new_quo[l] = sign_extend(((quo[l] << 1) | qbit) & MASK, WORD_BITS);
        flags[l].set(Flags::AQ, aq);
    }
    Ok(Effects::none()
        .reg(rd, new_rem)
        .reg(rd + 1, new_quo)
        .flags(Bank::Re, Flags::AQ, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sets_carry_and_overflow() {
        let (v, f) = add_sub(2047, 1, false, false, false);
        assert_eq!(v, -2048);
        assert!(f.contains(Flags::AV | Flags::AN));
        assert!(!f.contains(Flags::AC));
        let (v, f) = add_sub(-1, 1, false, false, false);
        assert_eq!(v, 0);
        assert!(f.contains(Flags::AC | Flags::AZ | Flags::AS));
        assert_eq!(add_sub(2047, 1, false, false, true).0, 2047);
    }

    #[test]
    fn subtract_carry_means_no_borrow() {
        let (v, f) = add_sub(5, 3, true, true, false);
        assert_eq!(v, 2);
        assert!(f.contains(Flags::AC));
        let (v, f) = add_sub(3, 5, true, true, false);
        assert_eq!(v, -2);
        assert!(!f.contains(Flags::AC));
        assert_eq!(add_sub(-2048, 1, true, true, true).0, -2048);
    }

    #[test]
    fn exponent_counts_sign_bits() {
        assert_eq!(exponent(0), 11);
        assert_eq!(exponent(1), 10);
        assert_eq!(exponent(-1), 11);
        assert_eq!(exponent(0x400), 0);
        assert_eq!(exponent(-2048), 0);
    }
}

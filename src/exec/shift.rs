use super::{per_lane, shape_error, Bank, Ctx, Effects};
use crate::cpu::Flags;
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{Member, Shape};
use crate::lanes::{fits_signed, sign_extend, LANES, WORD_BITS};

const MASK: u32 = 0xFFF;

/// One 12-bit shift. Amounts outside 0..=12 are clamped; ROL takes the
/// amount modulo the word width.
pub(super) fn shift_word(op: Opcode, a: i32, amount: i32) -> (i32, Flags) {
    let n = amount.clamp(0, WORD_BITS as i32) as u32;
    let ua = a as u32 & MASK;
    let mut f = Flags::empty();
    let raw = match op {
        Opcode::Lsl => {
            let exact = (a as i64) << n;
            f.set(Flags::SV, !fits_signed(exact, WORD_BITS));
            (exact as u32) & MASK
        }
        Opcode::Lsr => ua.checked_shr(n).unwrap_or(0),
        Opcode::Asr => (a >> n.min(31)) as u32 & MASK,
        Opcode::Rol => {
            let r = amount.rem_euclid(WORD_BITS as i32) as u32;
            ((ua << r) | (ua >> (WORD_BITS - r))) & MASK
        }
        _ => ua,
    };
    let v = sign_extend(raw as i32, WORD_BITS);
    f.set(Flags::SZ, v == 0);
    f.set(Flags::AZ, v == 0);
    (v, f)
}

/// `Rd = Rs shift Rt` or `Rd = Rs shift #n`.
pub(super) fn shift(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let a = cx.st.reg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let n = match m.shape {
        Shape::RRR => cx.st.reg(m.reg(2).ok_or_else(|| shape_error(m))?.index),
        Shape::RRImm => [m.imm(2).ok_or_else(|| shape_error(m))? as i32; LANES],
        _ => return Err(shape_error(m)),
    };
    let op = m.opcode();
    let (v, f) = per_lane(|l| shift_word(op, a[l], n[l]));
    Ok(Effects::none()
        .reg(rd, v)
        .flags(Bank::Re, Flags::SHIFT | Flags::AZ, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_shift_reports_overflow() {
        assert_eq!(shift_word(Opcode::Lsl, 3, 2).0, 12);
        let (v, f) = shift_word(Opcode::Lsl, 0x400, 1);
        assert_eq!(v, -2048);
        assert!(f.contains(Flags::SV));
        let (v, f) = shift_word(Opcode::Lsl, 1, 12);
        assert_eq!(v, 0);
        assert!(f.contains(Flags::SV | Flags::SZ | Flags::AZ));
    }

    #[test]
    fn right_shifts_differ_on_sign() {
        assert_eq!(shift_word(Opcode::Lsr, -2048, 11).0, 1);
        assert_eq!(shift_word(Opcode::Asr, -2048, 11).0, -1);
        assert_eq!(shift_word(Opcode::Asr, -8, 40).0, -1);
        assert_eq!(shift_word(Opcode::Lsr, 5, -3).0, 5);
    }

    #[test]
    fn rotate_wraps_amount() {
        assert_eq!(shift_word(Opcode::Rol, -2048, 1).0, 1);
        assert_eq!(shift_word(Opcode::Rol, 1, 13).0, 2);
        assert_eq!(shift_word(Opcode::Rol, 2, -1).0, 1);
    }
}

use super::{shape_error, Bank, Ctx, Effects, Write};
use crate::cpu::{Flags, Mstat};
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{Member, Shape};
use crate::lanes::{fits_signed, saturate, Sint, LANES};
use crate::operand::MulMode;

/// Accumulators overflow past 24 significant bits.
const ACC_BITS: u32 = 24;

fn unsigned(v: i32) -> i64 {
    (v & 0xFFF) as i64
}

pub(super) fn product(mode: MulMode, x: i32, y: i32) -> i64 {
    match mode {
        MulMode::Ss | MulMode::Rnd => x as i64 * y as i64,
        MulMode::Su => x as i64 * unsigned(y),
        MulMode::Us => unsigned(x) * y as i64,
        MulMode::Uu => unsigned(x) * unsigned(y),
    }
}

fn round(v: i64) -> i64 {
    (v + 0x800) & !0xFFF
}

/// Wraps to the 32-bit accumulator, then applies MV/MN and saturation.
pub(super) fn settle(v: i64, sat: bool) -> (i32, Flags) {
    let mut v = v as i32;
    let mut f = Flags::empty();
    if !fits_signed(v, ACC_BITS) {
        f.insert(Flags::MV);
        if sat {
            v = saturate(v, ACC_BITS).0;
        }
    }
    f.set(Flags::MN, v < 0);
    (v, f)
}

fn accumulate(op: Opcode, old: i32, p: i64) -> i64 {
    match op {
        Opcode::Mac => old as i64 + p,
        Opcode::Mas => old as i64 - p,
        _ => p,
    }
}

/// MPY/MAC/MAS on registers or complex pairs.
pub(super) fn multiply(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let acc = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let x = m.reg(1).ok_or_else(|| shape_error(m))?.index;
    let y = m.reg(2).ok_or_else(|| shape_error(m))?.index;
    let sat = cx.st.mstat.contains(Mstat::MAC_SAT);
    let op = m.opcode();
    let mode = m.mul_mode();
    let rnd = mode == MulMode::Rnd;
    match m.shape {
        Shape::AccRR => {
            let (a, b) = (cx.st.reg(x), cx.st.reg(y));
            let old = cx.st.acc[acc as usize];
            let mut v = [0; LANES];
            let mut f = [Flags::empty(); LANES];
            for l in 0..LANES {
                let mut r = accumulate(op, old[l], product(mode, a[l], b[l]));
                if rnd {
                    r = round(r);
                }
                (v[l], f[l]) = settle(r, sat);
            }
            Ok(Effects::none()
                .write(Write::Acc(acc, v))
                .flags(Bank::Re, Flags::MAC, f))
        }
        Shape::AccCrCr => complex_multiply(cx, m, acc, x, y, sat, rnd),
        _ => Err(shape_error(m)),
    }
}

/// Complex products go to the accumulator pair `ACCn` (real) and
/// `ACCn+1` (imaginary).
fn complex_multiply(
    cx: &Ctx,
    m: &Member,
    acc: u8,
    x: u8,
    y: u8,
    sat: bool,
    rnd: bool,
) -> Result<Effects, ExecError> {
    if acc as usize + 1 >= cx.st.acc.len() {
        return Err(shape_error(m));
    }
    let (a, b) = (cx.st.creg(x), cx.st.creg(y));
    let (old_re, old_im) = (cx.st.acc[acc as usize], cx.st.acc[acc as usize + 1]);
    let op = m.opcode();
    let mut re: Sint = [0; LANES];
    let mut im: Sint = [0; LANES];
    let mut f_re = [Flags::empty(); LANES];
    let mut f_im = [Flags::empty(); LANES];
    let mut f_c = [Flags::empty(); LANES];
    for l in 0..LANES {
        let (xr, xi) = (a[l].re as i64, a[l].im as i64);
        let (yr, yi) = (b[l].re as i64, if m.rec.conjugate { -(b[l].im as i64) } else { b[l].im as i64 });
        let mut pr = accumulate(op, old_re[l], xr * yr - xi * yi);
        let mut pi = accumulate(op, old_im[l], xr * yi + xi * yr);
        if rnd {
            pr = round(pr);
            pi = round(pi);
        }
        (re[l], f_re[l]) = settle(pr, sat);
        (im[l], f_im[l]) = settle(pi, sat);
        f_c[l] = (f_re[l] | f_im[l]) & Flags::MV;
        f_c[l].set(Flags::MN, f_re[l].contains(Flags::MN));
    }
    Ok(Effects::none()
        .write(Write::Acc(acc, re))
        .write(Write::Acc(acc + 1, im))
        .flags(Bank::Re, Flags::MAC, f_re)
        .flags(Bank::Im, Flags::MAC, f_im)
        .flags(Bank::Cplx, Flags::MAC, f_c))
}

/// CLR, SAT and RND on a whole accumulator.
pub(super) fn acc_op(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let acc = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let old = cx.st.acc[acc as usize];
    let sat = cx.st.mstat.contains(Mstat::MAC_SAT);
    let mut v = [0; LANES];
    let mut f = [Flags::empty(); LANES];
    for l in 0..LANES {
        (v[l], f[l]) = match m.opcode() {
            Opcode::Sat => {
                let s = saturate(old[l], ACC_BITS).0;
                (s, if s < 0 { Flags::MN } else { Flags::empty() })
            }
            Opcode::Rnd => settle(round(old[l] as i64), sat),
            _ => (0, Flags::empty()),
        };
    }
    Ok(Effects::none()
        .write(Write::Acc(acc, v))
        .flags(Bank::Re, Flags::MAC, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_modes() {
        assert_eq!(product(MulMode::Ss, -2, 3), -6);
        assert_eq!(product(MulMode::Su, 2, -1), 2 * 4095);
        assert_eq!(product(MulMode::Us, -1, 2), 4095 * 2);
        assert_eq!(product(MulMode::Uu, -1, -1), 4095 * 4095);
    }

    #[test]
    fn settle_flags_and_saturation() {
        let (v, f) = settle(0x80_0000, false);
        assert_eq!(v, 0x80_0000);
        assert!(f.contains(Flags::MV));
        let (v, f) = settle(0x80_0000, true);
        assert_eq!(v, 0x7F_FFFF);
        assert!(f.contains(Flags::MV));
        let (v, f) = settle(-5, true);
        assert_eq!(v, -5);
        assert_eq!(f, Flags::MN);
    }

    #[test]
    fn rounding_clears_low_word() {
        assert_eq!(round(0x1800), 0x2000);
        assert_eq!(round(0x17FF), 0x1000);
        assert_eq!(round(-0x800), 0);
    }
}

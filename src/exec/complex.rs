//! Complex ALU operations and the CORDIC unit.
//!
//! Every result updates three flag banks per lane: `re` from the real
//! half, `im` from the imaginary half and `cplx` from both (zero only when
//! both halves are, overflow and carry when either sets them, sign from the
//! real half).

use super::alu::{add_sub, logic, ARITH};
use super::{shape_error, Bank, Ctx, Effects};
use crate::cpu::Flags;
use crate::error::ExecError;
use crate::instructions::Opcode;
use crate::isa::shape::{Member, Shape};
use crate::lanes::{saturate, sign_extend, Cplx, Scplx, LANES, WORD_BITS};

const ITERATIONS: usize = 12;

/// `atan(2^-i)` in units of 2π/4096.
const ATAN: [i64; ITERATIONS] = [512, 302, 160, 81, 41, 20, 10, 5, 3, 1, 1, 0];

/// Reciprocal CORDIC gain, Q12.
const GAIN: i64 = 2487;

/// Half a turn in angle units.
const PI: i64 = 2048;

fn combine(re: Flags, im: Flags) -> Flags {
    let mut f = (re | im) & (Flags::AV | Flags::AC | Flags::MV | Flags::SV);
    f.set(Flags::AZ, re.contains(Flags::AZ) && im.contains(Flags::AZ));
    f.set(Flags::AN, re.contains(Flags::AN));
    f.set(Flags::AS, re.contains(Flags::AS));
    f
}

/// Writes `CRd` and the three flag banks.
fn finish(rd: u8, v: [(Cplx, Flags, Flags); LANES]) -> Effects {
    let out: Scplx = std::array::from_fn(|l| v[l].0);
    let f_re = std::array::from_fn(|l| v[l].1);
    let f_im = std::array::from_fn(|l| v[l].2);
    let f_c = std::array::from_fn(|l| combine(v[l].1, v[l].2));
    Effects::none()
        .reg(2 * rd, out.map(|c| c.re))
        .reg(2 * rd + 1, out.map(|c| c.im))
        .flags(Bank::Re, ARITH, f_re)
        .flags(Bank::Im, ARITH, f_im)
        .flags(Bank::Cplx, ARITH, f_c)
}

fn conj_if(c: Cplx, on: bool) -> Cplx {
    if on {
        Cplx::new(c.re, -c.im)
    } else {
        c
    }
}

/// `CRd = CRs +/- CRt`, with `CRt*` conjugating the second operand.
pub(super) fn binary(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let a = cx.st.creg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let b = cx.st.creg(m.reg(2).ok_or_else(|| shape_error(m))?.index);
    let sub = match m.opcode() {
        Opcode::Add => false,
        Opcode::Sub => true,
        _ => return Err(shape_error(m)),
    };
    let sat = cx.sat();
    let v = std::array::from_fn(|l| {
        let y = conj_if(b[l], m.rec.conjugate);
        let (re, fr) = add_sub(a[l].re, y.re, sub, sub, sat);
        let (im, fi) = add_sub(a[l].im, y.im, sub, sub, sat);
        (Cplx::new(re, im), fr, fi)
    });
    Ok(finish(rd, v))
}

/// PASS, NEG and CONJ on a complex pair. `CRs*` conjugates the source.
pub(super) fn unary(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    if m.shape != Shape::CrCr {
        return Err(shape_error(m));
    }
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let src = cx.st.creg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let sat = cx.sat();
    let op = m.opcode();
    let v = std::array::from_fn(|l| {
        let x = conj_if(src[l], m.rec.conjugate);
        let neg = |v| add_sub(0, v, true, true, sat);
        let ((re, fr), (im, fi)) = match op {
            Opcode::Neg => (neg(x.re), neg(x.im)),
            Opcode::Conj => (logic(x.re), neg(x.im)),
            _ => (logic(x.re), logic(x.im)),
        };
        (Cplx::new(re, im), fr, fi)
    });
    Ok(finish(rd, v))
}

fn wrap_angle(z: i64) -> i64 {
    sign_extend(z & 0xFFF, WORD_BITS)
}

fn clamp(v: i64) -> (i32, bool) {
    let (v, hit) = saturate(v, WORD_BITS);
    (v as i32, hit)
}

/// Vectoring mode: `(x, y)` to `(magnitude, angle)`.
pub fn polar(x: i32, y: i32) -> (i32, i32, bool) {
    let (mut x, mut y, mut z) = (x as i64, y as i64, 0i64);
    if x < 0 {
        (x, y, z) = (-x, -y, PI);
    }
    for (i, a) in ATAN.iter().enumerate() {
        (x, y, z) = if y >= 0 {
            (x + (y >> i), y - (x >> i), z + a)
        } else {
            (x - (y >> i), y + (x >> i), z - a)
        };
    }
    let (mag, hit) = clamp(x * GAIN >> 12);
    (mag, wrap_angle(z) as i32, hit)
}

/// Rotation mode: `(magnitude, angle)` to `(x, y)`.
pub fn rect(mag: i32, angle: i32) -> (i32, i32, bool) {
    let (mut x, mut y, mut z) = (mag as i64 * GAIN >> 12, 0i64, angle as i64);
    if z.abs() > PI / 2 {
        x = -x;
        z += if z > 0 { -PI } else { PI };
    }
    for (i, a) in ATAN.iter().enumerate() {
        (x, y, z) = if z >= 0 {
            (x - (y >> i), y + (x >> i), z - a)
        } else {
            (x + (y >> i), y - (x >> i), z + a)
        };
    }
    let (x, hx) = clamp(x);
    let (y, hy) = clamp(y);
    (x, y, hx || hy)
}

/// POLAR/RECT: `CRd` gets the converted form of `CRs`.
pub(super) fn cordic(cx: &Ctx, m: &Member) -> Result<Effects, ExecError> {
    if m.shape != Shape::CrCr {
        return Err(shape_error(m));
    }
    let rd = m.reg(0).ok_or_else(|| shape_error(m))?.index;
    let src = cx.st.creg(m.reg(1).ok_or_else(|| shape_error(m))?.index);
    let op = m.opcode();
    let v = std::array::from_fn(|l| {
        let s = conj_if(src[l], m.rec.conjugate);
        let (a, b, hit) = match op {
            Opcode::Polar => polar(s.re, s.im),
            _ => rect(s.re, s.im),
        };
        let (ra, mut fa) = logic(a);
        let (rb, fb) = logic(b);
        fa.set(Flags::AV, hit);
        (Cplx::new(ra, rb), fa, fb)
    });
    let fx = finish(rd, v);
    tracing::trace!(rd, ?op, "cordic");
    Ok(fx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_on_the_axes() {
        assert_eq!(polar(1000, 0), (1001, 0, false));
        assert_eq!(polar(0, 1000), (1000, 1024, false));
        assert_eq!(polar(0, -1000), (1001, -1024, false));
        assert_eq!(polar(-1000, 0), (1001, -2048, false));
        assert_eq!(polar(1000, 1000).1, 512);
    }

    #[test]
    fn rect_on_the_axes() {
        assert_eq!(rect(1000, 0), (999, 3, false));
        assert_eq!(rect(1000, 1024), (-3, 1001, false));
        assert_eq!(rect(1000, -1024), (0, -1001, false));
        assert_eq!(rect(1000, 2047), (-1001, 0, false));
    }

    #[test]
    fn combined_flags() {
        let f = combine(Flags::AZ, Flags::AN | Flags::AV);
        assert_eq!(f, Flags::AV);
        assert_eq!(combine(Flags::AZ, Flags::AZ), Flags::AZ);
    }
}

use num_traits::{PrimInt, Signed};
use serde::{Deserialize, Serialize};

/// Number of SIMD data paths.
pub const LANES: usize = 4;

/// Width of a general register and of a data memory word.
pub const WORD_BITS: u32 = 12;

/// One integer value per lane.
pub type Sint = [i32; LANES];

/// One complex value per lane.
pub type Scplx = [Cplx; LANES];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cplx {
    pub re: i32,
    pub im: i32,
}

impl Cplx {
    pub const fn new(re: i32, im: i32) -> Self {
        Self { re, im }
    }

    /// Packs the pair into the 24-bit memory representation (re in the upper half).
    pub fn to_packed24(self) -> i32 {
        let raw = ((self.re as u32 & 0xFFF) << 12) | (self.im as u32 & 0xFFF);
        sign_extend(raw as i32, 24)
    }

    /// Inverse of [`Cplx::to_packed24`]: the 24-bit value is sign-extended first.
    pub fn from_packed24(v: i32) -> Self {
        let v = sign_extend(v, 24);
        Self {
            re: v >> 12,
            im: sign_extend(v & 0xFFF, WORD_BITS),
        }
    }
}

/// Per-lane commit mask; bit `n` selects lane `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneMask(u8);

impl LaneMask {
    pub const ALL: LaneMask = LaneMask((1 << LANES) - 1);
    pub const NONE: LaneMask = LaneMask(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bits = 0u8;
        for lane in 0..LANES {
            if f(lane) {
                bits |= 1 << lane;
            }
        }
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_set(self, lane: usize) -> bool {
        lane < LANES && self.0 & (1 << lane) != 0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn all(self) -> bool {
        self == Self::ALL
    }

    pub fn lanes(self) -> impl Iterator<Item = usize> {
        (0..LANES).filter(move |&l| self.is_set(l))
    }
}

impl Default for LaneMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Sign-extends the low `bits` bits of `v`.
pub fn sign_extend<T: PrimInt + Signed>(v: T, bits: u32) -> T {
    let total = (std::mem::size_of::<T>() * 8) as u32;
    if bits >= total {
        return v;
    }
    let s = total - bits;
    v.signed_shl(s).signed_shr(s)
}

/// Clamps `v` into the signed `bits`-wide range, reporting whether it had to.
pub fn saturate<T: PrimInt + Signed>(v: T, bits: u32) -> (T, bool) {
    let one = T::one();
    let max = (one << (bits as usize - 1)) - one;
    let min = -(one << (bits as usize - 1));
    if v > max {
        (max, true)
    } else if v < min {
        (min, true)
    } else {
        (v, false)
    }
}

/// True when `v` is representable as a signed `bits`-wide value.
pub fn fits_signed<T: PrimInt + Signed>(v: T, bits: u32) -> bool {
    sign_extend(v, bits) == v
}

/// Lane-wise merge: masked lanes take `new`, the rest keep `old`.
pub fn merge<T: Copy>(old: [T; LANES], new: [T; LANES], mask: LaneMask) -> [T; LANES] {
    let mut out = old;
    for l in mask.lanes() {
        out[l] = new[l];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_and_saturate() {
        assert_eq!(sign_extend(0xFFFi32, 12), -1);
        assert_eq!(sign_extend(0x7FFi32, 12), 2047);
        assert_eq!(sign_extend(0x800i64, 12), -2048);
        assert_eq!(saturate(5000i32, 12), (2047, true));
        assert_eq!(saturate(-5000i32, 12), (-2048, true));
        assert_eq!(saturate(-7i32, 12), (-7, false));
        assert!(fits_signed(-2048i32, 12));
        assert!(!fits_signed(2048i32, 12));
    }

    #[test]
    fn packed24_keeps_both_halves() {
        let c = Cplx::new(-3, 1000);
        assert_eq!(Cplx::from_packed24(c.to_packed24()), c);
        let c = Cplx::new(2047, -2048);
        assert_eq!(Cplx::from_packed24(c.to_packed24()), c);
    }

    #[test]
    fn merge_respects_mask() {
        let m = LaneMask::from_bits(0b0101);
        assert_eq!(merge([1, 2, 3, 4], [9, 9, 9, 9], m), [9, 2, 9, 4]);
        assert_eq!(m.lanes().collect::<Vec<_>>(), vec![0, 2]);
        assert!(LaneMask::ALL.all());
        assert!(!LaneMask::NONE.any());
    }
}

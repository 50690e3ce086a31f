use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::lanes::{merge, sign_extend, Cplx, LaneMask, Scplx, Sint, LANES, WORD_BITS};
use crate::operand::{AccPart, Condition, Reg, RegClass, SysReg};
use crate::stack::Stacks;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Taken branches redirect after one delay-slot instruction.
    pub delay_slots: bool,
    /// Data memory size in words.
    pub data_words: usize,
    /// Depth of every controller stack.
    pub stack_depth: usize,
    /// Step cap for unattended runs.
    pub max_steps: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            delay_slots: false,
            data_words: 0x1_0000,
            stack_depth: 8,
            max_steps: 1_000_000,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flags: u16 {
const AZ = 1 << 0; // ALU zero
const AN = 1 << 1; // ALU negative
const AV = 1 << 2; // ALU overflow
const AC = 1 << 3; // ALU carry
const AS = 1 << 4; // sign of the first ALU input
const AQ = 1 << 5; // divide quotient
const MV = 1 << 6; // multiplier overflow
const MN = 1 << 7; // multiplier negative
const SV = 1 << 8; // shifter overflow
const SZ = 1 << 9; // shifter zero
const AVS = 1 << 10; // sticky AV
const MVS = 1 << 11; // sticky MV
const SVS = 1 << 12; // sticky SV
}
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mstat: u16 {
const ALU_SAT = 1 << 0;
const MAC_SAT = 1 << 1;
const BIT_REV = 1 << 2;
}
}

impl Flags {
    pub const ALU: Flags = Flags::AZ
        .union(Flags::AN)
        .union(Flags::AV)
        .union(Flags::AC)
        .union(Flags::AS)
        .union(Flags::AQ);
    pub const MAC: Flags = Flags::MV.union(Flags::MN);
    pub const SHIFT: Flags = Flags::SV.union(Flags::SZ);

    /// Replaces the flags in `group` with `new`, then latches the sticky bits.
    pub fn update(&mut self, group: Flags, new: Flags) {
        self.remove(group);
        self.insert(new & group);
        if new.contains(Flags::AV) {
            self.insert(Flags::AVS);
        }
        if new.contains(Flags::MV) {
            self.insert(Flags::MVS);
        }
        if new.contains(Flags::SV) {
            self.insert(Flags::SVS);
        }
    }
}

/// Per-lane status: real, imaginary and complex-combined flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagBank {
    pub re: Flags,
    pub im: Flags,
    pub cplx: Flags,
}

impl FlagBank {
    pub const fn empty() -> Self {
        Self { re: Flags::empty(), im: Flags::empty(), cplx: Flags::empty() }
    }
}

/// Architectural state of the SIMD core.
///
/// General registers, accumulators and flags are replicated per lane; the
/// DAG registers, MSTAT, CNTR and the stacks are shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub r: [Sint; 32],
    pub acc: [Sint; 8],
    pub i: [u32; 8],
    pub m: [i32; 8],
    pub l: [u32; 8],
    pub b: [u32; 8],
    pub flags: [FlagBank; LANES],
    pub mstat: Mstat,
    /// Loop count register; 0 stands for 0x10000.
    pub cntr: u16,
    pub stacks: Stacks,
    stack_depth: usize,
}

impl MachineState {
    pub fn new(cfg: &MachineConfig) -> Self {
        Self {
            r: [[0; LANES]; 32],
            acc: [[0; LANES]; 8],
            i: [0; 8],
            m: [0; 8],
            l: [0; 8],
            b: [0; 8],
            flags: [FlagBank::empty(); LANES],
            mstat: Mstat::empty(),
            cntr: 0,
            stacks: Stacks::new(cfg.stack_depth),
            stack_depth: cfg.stack_depth,
        }
    }

    /// RESET: mode, status, CNTR and stacks; general registers survive.
    pub fn reset(&mut self) {
        self.flags = [FlagBank::empty(); LANES];
        self.mstat = Mstat::empty();
        self.cntr = 0;
        self.stacks = Stacks::new(self.stack_depth);
    }

    /// Full initialisation: everything back to zero.
    pub fn init(&mut self) {
        self.reset();
        self.r = [[0; LANES]; 32];
        self.acc = [[0; LANES]; 8];
        self.i = [0; 8];
        self.m = [0; 8];
        self.l = [0; 8];
        self.b = [0; 8];
    }

    pub fn reg(&self, idx: u8) -> Sint {
        self.r[idx as usize]
    }

    /// Writes a general register through the lane mask, wrapping to 12 bits.
    pub fn set_reg(&mut self, idx: u8, v: Sint, mask: LaneMask) {
        let v = v.map(|x| sign_extend(x, WORD_BITS));
        let slot = &mut self.r[idx as usize];
        *slot = merge(*slot, v, mask);
    }

    /// CRn is the pair (R2n, R2n+1).
    pub fn creg(&self, idx: u8) -> Scplx {
        let re = self.r[2 * idx as usize];
        let im = self.r[2 * idx as usize + 1];
        std::array::from_fn(|l| Cplx::new(re[l], im[l]))
    }

    pub fn set_creg(&mut self, idx: u8, v: Scplx, mask: LaneMask) {
        self.set_reg(2 * idx, v.map(|c| c.re), mask);
        self.set_reg(2 * idx + 1, v.map(|c| c.im), mask);
    }

    pub fn set_acc(&mut self, idx: u8, v: Sint, mask: LaneMask) {
        let slot = &mut self.acc[idx as usize];
        *slot = merge(*slot, v, mask);
    }

    /// Reads one H/M/L view of an accumulator as a 12-bit register value.
    pub fn acc_part(&self, idx: u8, part: AccPart) -> Sint {
        self.acc[idx as usize].map(|a| sign_extend(a >> part.shift(), part.width()))
    }

    pub fn set_acc_part(&mut self, idx: u8, part: AccPart, v: Sint, mask: LaneMask) {
        let field = ((1u32 << part.width()) - 1) << part.shift();
        let cur = self.acc[idx as usize];
        let new = std::array::from_fn(|l| {
            let bits = ((v[l] as u32) << part.shift()) & field;
            ((cur[l] as u32 & !field) | bits) as i32
        });
        self.set_acc(idx, new, mask);
    }

    pub fn dag(&self, r: Reg) -> i32 {
        let n = r.index as usize;
        match r.class {
            RegClass::I => self.i[n] as i32,
            RegClass::M => self.m[n],
            RegClass::L => self.l[n] as i32,
            RegClass::B => self.b[n] as i32,
            _ => 0,
        }
    }

    /// I, L and B hold 16-bit addresses, M a signed 16-bit step.
    pub fn set_dag(&mut self, r: Reg, v: i32) {
        let n = r.index as usize;
        match r.class {
            RegClass::I => self.i[n] = v as u32 & 0xFFFF,
            RegClass::M => self.m[n] = sign_extend(v, 16),
            RegClass::L => self.l[n] = v as u32 & 0xFFFF,
            RegClass::B => self.b[n] = v as u32 & 0xFFFF,
            _ => {}
        }
    }

    pub fn sys(&self, s: SysReg) -> Sint {
        match s {
            SysReg::Cntr => [self.cntr as i32; LANES],
            SysReg::Mstat => [self.mstat.bits() as i32; LANES],
            SysReg::Astat => std::array::from_fn(|l| (self.flags[l].re.bits() & 0xFFF) as i32),
            SysReg::Id => std::array::from_fn(|l| l as i32),
        }
    }

    /// Writes a shared system register; ASTAT and ID are read-only.
    pub fn set_sys(&mut self, s: SysReg, v: i32) {
        match s {
            SysReg::Cntr => self.cntr = v as u16,
            SysReg::Mstat => self.mstat = Mstat::from_bits_truncate(v as u16),
            SysReg::Astat | SysReg::Id => {}
        }
    }

    /// Value CE tests: the innermost loop counter, or CNTR outside loops.
    pub fn loop_counter(&self) -> u16 {
        self.stacks.loop_count.top().copied().unwrap_or(self.cntr)
    }

    pub fn cond_lane(&self, c: Condition, lane: usize) -> bool {
        let f = self.flags[lane].re;
        let lt = f.contains(Flags::AN) != f.contains(Flags::AV);
        let z = f.contains(Flags::AZ);
        match c {
            Condition::Eq => z,
            Condition::Ne => !z,
            Condition::Gt => !(lt || z),
            Condition::Le => lt || z,
            Condition::Lt => lt,
            Condition::Ge => !lt,
            Condition::Av => f.contains(Flags::AV),
            Condition::NotAv => !f.contains(Flags::AV),
            Condition::Ac => f.contains(Flags::AC),
            Condition::NotAc => !f.contains(Flags::AC),
            Condition::Neg => f.contains(Flags::AN),
            Condition::Pos => !f.contains(Flags::AN),
            Condition::Mv => f.contains(Flags::MV),
            Condition::NotMv => !f.contains(Flags::MV),
            Condition::Sv => f.contains(Flags::SV),
            Condition::NotSv => !f.contains(Flags::SV),
            Condition::Ce => self.loop_counter() == 1,
            Condition::NotCe => self.loop_counter() != 1,
            Condition::Aq => f.contains(Flags::AQ),
            Condition::NotAq => !f.contains(Flags::AQ),
            Condition::Forever => false,
            Condition::True => true,
        }
    }

    /// Lanes whose own flags satisfy `c`.
    pub fn condition_mask(&self, c: Condition) -> LaneMask {
        LaneMask::from_fn(|l| self.cond_lane(c, l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_registers_init_clears_them() {
        let mut st = MachineState::new(&MachineConfig::default());
        st.set_reg(3, [1, 2, 3, 4], LaneMask::ALL);
        st.mstat = Mstat::ALU_SAT;
        st.cntr = 7;
        st.reset();
        assert_eq!(st.reg(3), [1, 2, 3, 4]);
        assert_eq!(st.mstat, Mstat::empty());
        assert_eq!(st.cntr, 0);
        st.init();
        assert_eq!(st.reg(3), [0; LANES]);
    }

    #[test]
    fn acc_views_alias_the_accumulator() {
        let mut st = MachineState::new(&MachineConfig::default());
        st.set_acc(0, [0x1234_5678; LANES], LaneMask::ALL);
        assert_eq!(st.acc_part(0, AccPart::H)[0], 0x12);
        assert_eq!(st.acc_part(0, AccPart::M)[0], 0x345);
        assert_eq!(st.acc_part(0, AccPart::L)[0], sign_extend(0x678, 12));
        st.set_acc_part(0, AccPart::M, [-1; LANES], LaneMask::from_bits(1));
        assert_eq!(st.acc[0][0], 0x12FF_F678);
        assert_eq!(st.acc[0][1], 0x1234_5678);
    }

    #[test]
    fn conditions_follow_lane_flags() {
        let mut st = MachineState::new(&MachineConfig::default());
        st.flags[1].re = Flags::AZ;
        st.flags[2].re = Flags::AN;
        assert_eq!(st.condition_mask(Condition::Eq).bits(), 0b0010);
        assert_eq!(st.condition_mask(Condition::Lt).bits(), 0b0100);
        assert_eq!(st.condition_mask(Condition::Gt).bits(), 0b1001);
        st.cntr = 1;
        assert!(st.condition_mask(Condition::Ce).all());
    }

    #[test]
    fn sticky_bits_latch() {
        let mut f = Flags::empty();
        f.update(Flags::ALU, Flags::AV | Flags::AN);
        f.update(Flags::ALU, Flags::AZ);
        assert_eq!(f, Flags::AZ | Flags::AVS);
    }
}

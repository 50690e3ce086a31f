//! SDSP instruction formats.
//!
//! Every instruction word is 32 bits wide. A layout lists its fields MSB
//! first, starting with the fixed opcode bits. Single operations start with
//! a `0` bit; multifunction bundles start with `1` followed by a 3-bit
//! bundle shape.

use serde::{Deserialize, Serialize};

use super::shape::{BundleShape, Shape};
use crate::instructions::Opcode;

pub const WORD_BITS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatId {
    Alu3r,
    Alu2r,
    Alu1r,
    AluCmp,
    AluRri,
    AluRi,
    ShfR,
    ShfI,
    LdiR,
    LdiDag,
    LdiSys,
    MemDir,
    MemCDir,
    MemRm,
    MemRi,
    MemCm,
    MemCi,
    MacRr,
    MacCc,
    Cpx3,
    Cpx2,
    MovRa,
    MovAr,
    MovRd,
    MovDr,
    MovRs,
    MovSr,
    AccOp,
    Modify,
    BrRel,
    BrInd,
    Do,
    Ret,
    Mode,
    Sys,
    BAluLd,
    BAluSt,
    BMacLd,
    BMacSt,
    BMacLdLd,
    BShfLd,
    BShfSt,
    BAluMac,
}

impl FormatId {
    pub fn layout(self) -> &'static Layout {
        &LAYOUTS[self as usize]
    }

    pub fn tag(self) -> &'static str {
        self.layout().tag
    }

    pub fn is_bundle(self) -> bool {
        self as usize >= FormatId::BAluLd as usize
    }
}

/// Which member of a (possibly bundled) instruction a field reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The only operation of a single-op word.
    Op,
    Alu,
    Mac,
    Shf,
    Ld,
    /// Second load of a MAC+LD+LD bundle.
    Ld2,
    St,
}

/// Operand a field is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Nth(u8),
    /// The memory operand, wherever the shape puts it.
    Mem,
    /// The register transferred by a load or store.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Signed,
    Unsigned,
    /// Either a signed or an unsigned reading must fit.
    Either,
}

impl Sign {
    pub fn fits(self, v: i64, width: u8) -> bool {
        let w = width as u32;
        let smin = -(1i64 << (w - 1));
        let smax = (1i64 << (w - 1)) - 1;
        let umax = (1i64 << w) - 1;
        match self {
            Sign::Signed => (smin..=smax).contains(&v),
            Sign::Unsigned => (0..=umax).contains(&v),
            Sign::Either => (smin..=umax).contains(&v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Opcode,
    Pad,
    /// Condition code of the word.
    Cond,
    /// Register index minus `base`.
    Reg { base: u8 },
    /// Even accumulator of a complex pair, stored halved.
    AccPair,
    /// Five-bit DAG register code.
    Dag,
    Sys,
    /// Accumulator sub-view H/M/L.
    Part,
    Imm(Sign),
    /// Absolute data address (relocatable).
    Addr,
    /// `target - addr` (relocatable).
    PcRel,
    /// `end - (addr + 1)` (relocatable).
    LoopEnd,
    Index { base: u8 },
    Modify { base: u8 },
    /// Set for pre-modify addressing.
    Pre,
    /// Signed immediate modifier.
    Step,
    /// Multiply mode; zero width means only (SS) is encodable.
    Mode,
    Conj,
    /// Position of the member's opcode in a bundle sub-op table.
    SubOp(&'static [Opcode]),
    ModeBit,
    /// DO termination condition.
    TermCond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    pub role: Role,
    pub arg: Arg,
    pub width: u8,
}

impl Field {
    pub fn is_reloc(&self) -> bool {
        matches!(self.kind, FieldKind::Addr | FieldKind::PcRel | FieldKind::LoopEnd)
    }
}

#[derive(Debug)]
pub struct Layout {
    pub id: FormatId,
    pub tag: &'static str,
    pub fields: &'static [Field],
}

impl Layout {
    pub fn width(&self) -> u32 {
        self.fields.iter().map(|f| f.width as u32).sum()
    }

    pub fn fixed_width(&self) -> u8 {
        match self.fields.first() {
            Some(f) if f.kind == FieldKind::Opcode => f.width,
            _ => 0,
        }
    }

    pub fn has_cond(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::Cond)
    }
}

pub const ALU3: &[Opcode] = &[
    Opcode::Add,
    Opcode::Adc,
    Opcode::Sub,
    Opcode::Sbc,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Max,
];
pub const MAC2: &[Opcode] = &[Opcode::Mpy, Opcode::Mac, Opcode::Mas];
pub const MAC1: &[Opcode] = &[Opcode::Mac, Opcode::Mas];
pub const SHF2: &[Opcode] = &[Opcode::Lsl, Opcode::Lsr, Opcode::Asr, Opcode::Rol];

const fn fld(kind: FieldKind, role: Role, arg: Arg, width: u8) -> Field {
    Field { kind, role, arg, width }
}
const fn fixed(width: u8) -> Field {
    fld(FieldKind::Opcode, Role::Op, Arg::Nth(0), width)
}
const fn pad(width: u8) -> Field {
    fld(FieldKind::Pad, Role::Op, Arg::Nth(0), width)
}
const COND: Field = fld(FieldKind::Cond, Role::Op, Arg::Nth(0), 5);
const fn reg(n: u8, width: u8) -> Field {
    fld(FieldKind::Reg { base: 0 }, Role::Op, Arg::Nth(n), width)
}
const fn imm(n: u8, width: u8, sign: Sign) -> Field {
    fld(FieldKind::Imm(sign), Role::Op, Arg::Nth(n), width)
}
const fn on(role: Role, kind: FieldKind, arg: Arg, width: u8) -> Field {
    fld(kind, role, arg, width)
}
const fn breg(role: Role, arg: Arg, width: u8, base: u8) -> Field {
    fld(FieldKind::Reg { base }, role, arg, width)
}
const fn index(role: Role, width: u8, base: u8) -> Field {
    fld(FieldKind::Index { base }, role, Arg::Mem, width)
}
const fn modify(role: Role, width: u8, base: u8) -> Field {
    fld(FieldKind::Modify { base }, role, Arg::Mem, width)
}
const DATA5: Field = fld(FieldKind::Reg { base: 0 }, Role::Op, Arg::Data, 5);
const DATA4: Field = fld(FieldKind::Reg { base: 0 }, Role::Op, Arg::Data, 4);
const PRE: Field = fld(FieldKind::Pre, Role::Op, Arg::Mem, 1);
const STEP: Field = fld(FieldKind::Step, Role::Op, Arg::Mem, 11);
const ADDR: Field = fld(FieldKind::Addr, Role::Op, Arg::Mem, 16);
const MODE3: Field = fld(FieldKind::Mode, Role::Op, Arg::Nth(0), 3);
const CONJ: Field = fld(FieldKind::Conj, Role::Op, Arg::Nth(0), 1);

macro_rules! layout {
    ($id:ident, $tag:expr, [$($f:expr),* $(,)?]) => {
        Layout { id: FormatId::$id, tag: $tag, fields: &[$($f),*] }
    };
}

/// Indexed by `FormatId as usize`.
pub static LAYOUTS: &[Layout] = &[
    layout!(Alu3r, "ALU3R", [fixed(12), reg(0, 5), reg(1, 5), reg(2, 5), COND]),
    layout!(Alu2r, "ALU2R", [fixed(12), reg(0, 5), reg(1, 5), pad(5), COND]),
    layout!(Alu1r, "ALU1R", [fixed(12), reg(0, 5), pad(10), COND]),
    layout!(AluCmp, "ALUCMP", [fixed(12), pad(5), reg(0, 5), reg(1, 5), COND]),
    layout!(AluRri, "ALURRI", [fixed(8), reg(0, 5), reg(1, 5), imm(2, 9, Sign::Signed), COND]),
    layout!(AluRi, "ALURI", [fixed(8), pad(5), reg(0, 5), imm(1, 9, Sign::Signed), COND]),
    layout!(ShfR, "SHFR", [fixed(8), reg(0, 5), reg(1, 5), reg(2, 5), pad(4), COND]),
    layout!(ShfI, "SHFI", [fixed(8), reg(0, 5), reg(1, 5), imm(2, 5, Sign::Unsigned), pad(4), COND]),
    layout!(LdiR, "LDIR", [fixed(7), reg(0, 5), imm(1, 12, Sign::Either), pad(3), COND]),
    layout!(LdiDag, "LDIDAG", [
        fixed(7),
        fld(FieldKind::Dag, Role::Op, Arg::Nth(0), 5),
        imm(1, 15, Sign::Either),
        COND,
    ]),
    layout!(LdiSys, "LDISYS", [
        fixed(7),
        fld(FieldKind::Sys, Role::Op, Arg::Nth(0), 4),
        imm(1, 16, Sign::Either),
        COND,
    ]),
    layout!(MemDir, "MEMDIR", [fixed(6), DATA5, ADDR, COND]),
    layout!(MemCDir, "MEMCDIR", [fixed(6), pad(1), DATA4, ADDR, COND]),
    layout!(MemRm, "MEMRM", [
        fixed(7),
        DATA5,
        index(Role::Op, 3, 0),
        modify(Role::Op, 3, 0),
        PRE,
        pad(8),
        COND,
    ]),
    layout!(MemRi, "MEMRI", [fixed(7), DATA5, index(Role::Op, 3, 0), PRE, STEP, COND]),
    layout!(MemCm, "MEMCM", [
        fixed(7),
        pad(1),
        DATA4,
        index(Role::Op, 3, 0),
        modify(Role::Op, 3, 0),
        PRE,
        pad(8),
        COND,
    ]),
    layout!(MemCi, "MEMCI", [fixed(7), pad(1), DATA4, index(Role::Op, 3, 0), PRE, STEP, COND]),
    layout!(MacRr, "MACRR", [fixed(6), reg(0, 3), reg(1, 5), reg(2, 5), MODE3, pad(5), COND]),
    layout!(MacCc, "MACCC", [
        fixed(7),
        fld(FieldKind::AccPair, Role::Op, Arg::Nth(0), 2),
        reg(1, 4),
        reg(2, 4),
        CONJ,
        MODE3,
        pad(6),
        COND,
    ]),
    layout!(Cpx3, "CPX3", [fixed(12), reg(0, 4), reg(1, 4), reg(2, 4), CONJ, pad(2), COND]),
    layout!(Cpx2, "CPX2", [fixed(12), reg(0, 4), reg(1, 4), pad(4), CONJ, pad(2), COND]),
    layout!(MovRa, "MOVRA", [
        fixed(8),
        reg(0, 5),
        reg(1, 3),
        fld(FieldKind::Part, Role::Op, Arg::Nth(1), 2),
        pad(9),
        COND,
    ]),
    layout!(MovAr, "MOVAR", [
        fixed(8),
        reg(0, 3),
        fld(FieldKind::Part, Role::Op, Arg::Nth(0), 2),
        reg(1, 5),
        pad(9),
        COND,
    ]),
    layout!(MovRd, "MOVRD", [
        fixed(8),
        reg(0, 5),
        fld(FieldKind::Dag, Role::Op, Arg::Nth(1), 5),
        pad(9),
        COND,
    ]),
    layout!(MovDr, "MOVDR", [
        fixed(8),
        fld(FieldKind::Dag, Role::Op, Arg::Nth(0), 5),
        reg(1, 5),
        pad(9),
        COND,
    ]),
    layout!(MovRs, "MOVRS", [
        fixed(8),
        reg(0, 5),
        fld(FieldKind::Sys, Role::Op, Arg::Nth(1), 4),
        pad(10),
        COND,
    ]),
    layout!(MovSr, "MOVSR", [
        fixed(8),
        fld(FieldKind::Sys, Role::Op, Arg::Nth(0), 4),
        reg(1, 5),
        pad(10),
        COND,
    ]),
    layout!(AccOp, "ACCOP", [fixed(11), reg(0, 3), pad(13), COND]),
    layout!(Modify, "MODIFY", [fixed(8), reg(0, 3), reg(1, 3), pad(13), COND]),
    layout!(BrRel, "BRREL", [fixed(8), fld(FieldKind::PcRel, Role::Op, Arg::Nth(0), 19), COND]),
    layout!(BrInd, "BRIND", [fixed(8), reg(0, 3), pad(16), COND]),
    layout!(Do, "DO", [
        fixed(8),
        fld(FieldKind::LoopEnd, Role::Op, Arg::Nth(0), 16),
        pad(3),
        fld(FieldKind::TermCond, Role::Op, Arg::Nth(1), 5),
    ]),
    layout!(Ret, "RET", [fixed(8), pad(19), COND]),
    layout!(Mode, "MODE", [
        fixed(12),
        fld(FieldKind::ModeBit, Role::Op, Arg::Nth(0), 4),
        pad(11),
        COND,
    ]),
    layout!(Sys, "SYS", [fixed(12), pad(20)]),
    layout!(BAluLd, "B.ALU+LD", [
        fixed(4),
        on(Role::Alu, FieldKind::SubOp(ALU3), Arg::Nth(0), 3),
        breg(Role::Alu, Arg::Nth(0), 4, 0),
        breg(Role::Alu, Arg::Nth(1), 4, 0),
        breg(Role::Alu, Arg::Nth(2), 4, 0),
        breg(Role::Ld, Arg::Data, 4, 0),
        index(Role::Ld, 2, 0),
        modify(Role::Ld, 2, 0),
        COND,
    ]),
    layout!(BAluSt, "B.ALU+ST", [
        fixed(4),
        on(Role::Alu, FieldKind::SubOp(ALU3), Arg::Nth(0), 3),
        breg(Role::Alu, Arg::Nth(0), 4, 0),
        breg(Role::Alu, Arg::Nth(1), 4, 0),
        breg(Role::Alu, Arg::Nth(2), 4, 0),
        breg(Role::St, Arg::Data, 4, 0),
        index(Role::St, 2, 0),
        modify(Role::St, 2, 0),
        COND,
    ]),
    layout!(BMacLd, "B.MAC+LD", [
        fixed(4),
        on(Role::Mac, FieldKind::SubOp(MAC2), Arg::Nth(0), 2),
        breg(Role::Mac, Arg::Nth(0), 2, 0),
        breg(Role::Mac, Arg::Nth(1), 4, 0),
        breg(Role::Mac, Arg::Nth(2), 4, 0),
        on(Role::Mac, FieldKind::Mode, Arg::Nth(0), 3),
        breg(Role::Ld, Arg::Data, 4, 0),
        index(Role::Ld, 2, 0),
        modify(Role::Ld, 2, 0),
        COND,
    ]),
    layout!(BMacSt, "B.MAC+ST", [
        fixed(4),
        on(Role::Mac, FieldKind::SubOp(MAC2), Arg::Nth(0), 2),
        breg(Role::Mac, Arg::Nth(0), 2, 0),
        breg(Role::Mac, Arg::Nth(1), 4, 0),
        breg(Role::Mac, Arg::Nth(2), 4, 0),
        on(Role::Mac, FieldKind::Mode, Arg::Nth(0), 3),
        breg(Role::St, Arg::Data, 4, 0),
        index(Role::St, 2, 0),
        modify(Role::St, 2, 0),
        COND,
    ]),
    layout!(BMacLdLd, "B.MAC+LD+LD", [
        fixed(4),
        on(Role::Mac, FieldKind::SubOp(MAC2), Arg::Nth(0), 2),
        breg(Role::Mac, Arg::Nth(0), 1, 0),
        breg(Role::Mac, Arg::Nth(1), 3, 0),
        breg(Role::Mac, Arg::Nth(2), 3, 0),
        on(Role::Mac, FieldKind::Mode, Arg::Nth(0), 0),
        breg(Role::Ld, Arg::Data, 2, 0),
        index(Role::Ld, 2, 0),
        modify(Role::Ld, 2, 0),
        breg(Role::Ld2, Arg::Data, 2, 4),
        index(Role::Ld2, 2, 4),
        modify(Role::Ld2, 2, 4),
        pad(2),
        COND,
    ]),
    layout!(BShfLd, "B.SHF+LD", [
        fixed(4),
        on(Role::Shf, FieldKind::SubOp(SHF2), Arg::Nth(0), 2),
        breg(Role::Shf, Arg::Nth(0), 4, 0),
        breg(Role::Shf, Arg::Nth(1), 4, 0),
        on(Role::Shf, FieldKind::Imm(Sign::Unsigned), Arg::Nth(2), 5),
        breg(Role::Ld, Arg::Data, 4, 0),
        index(Role::Ld, 2, 0),
        modify(Role::Ld, 2, 0),
        COND,
    ]),
    layout!(BShfSt, "B.SHF+ST", [
        fixed(4),
        on(Role::Shf, FieldKind::SubOp(SHF2), Arg::Nth(0), 2),
        breg(Role::Shf, Arg::Nth(0), 4, 0),
        breg(Role::Shf, Arg::Nth(1), 4, 0),
        on(Role::Shf, FieldKind::Imm(Sign::Unsigned), Arg::Nth(2), 5),
        breg(Role::St, Arg::Data, 4, 0),
        index(Role::St, 2, 0),
        modify(Role::St, 2, 0),
        COND,
    ]),
    layout!(BAluMac, "B.ALU+MAC", [
        fixed(4),
        on(Role::Alu, FieldKind::SubOp(ALU3), Arg::Nth(0), 3),
        breg(Role::Alu, Arg::Nth(0), 4, 0),
        breg(Role::Alu, Arg::Nth(1), 4, 0),
        breg(Role::Alu, Arg::Nth(2), 4, 0),
        on(Role::Mac, FieldKind::SubOp(MAC1), Arg::Nth(0), 1),
        breg(Role::Mac, Arg::Nth(0), 1, 0),
        breg(Role::Mac, Arg::Nth(1), 3, 0),
        breg(Role::Mac, Arg::Nth(2), 3, 0),
        on(Role::Mac, FieldKind::Mode, Arg::Nth(0), 0),
        COND,
    ]),
];

/// One (opcode, operand shape) pairing and the word it starts with.
#[derive(Debug, Clone, Copy)]
pub struct FormatEntry {
    pub opcode: Opcode,
    pub shape: Shape,
    pub format: FormatId,
    /// Value of the leading `Opcode` field.
    pub fixed: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BundleEntry {
    pub shape: BundleShape,
    pub format: FormatId,
    pub fixed: u32,
}

const fn e(opcode: Opcode, shape: Shape, format: FormatId, fixed: u32) -> FormatEntry {
    FormatEntry { opcode, shape, format, fixed }
}

use self::FormatId as F;
use super::shape::Shape as S;
use crate::instructions::Opcode as O;

pub static ENTRIES: &[FormatEntry] = &[
    // 0000 + op8
    e(O::Add, S::RRR, F::Alu3r, 0x000),
    e(O::Adc, S::RRR, F::Alu3r, 0x001),
    e(O::Sub, S::RRR, F::Alu3r, 0x002),
    e(O::Sbc, S::RRR, F::Alu3r, 0x003),
    e(O::And, S::RRR, F::Alu3r, 0x004),
    e(O::Or, S::RRR, F::Alu3r, 0x005),
    e(O::Xor, S::RRR, F::Alu3r, 0x006),
    e(O::Min, S::RRR, F::Alu3r, 0x007),
    e(O::Max, S::RRR, F::Alu3r, 0x008),
    e(O::Not, S::RR, F::Alu2r, 0x010),
    e(O::Neg, S::RR, F::Alu2r, 0x011),
    e(O::Abs, S::RR, F::Alu2r, 0x012),
    e(O::Pass, S::RR, F::Alu2r, 0x013),
    e(O::Inc, S::RR, F::Alu2r, 0x014),
    e(O::Dec, S::RR, F::Alu2r, 0x015),
    e(O::Exp, S::RR, F::Alu2r, 0x016),
    e(O::Divs, S::RR, F::Alu2r, 0x017),
    e(O::Divq, S::RR, F::Alu2r, 0x018),
    e(O::Mov, S::RR, F::Alu2r, 0x019),
    e(O::Clr, S::R, F::Alu1r, 0x020),
    e(O::Cmp, S::RR, F::AluCmp, 0x028),
    // 0001 + op4
    e(O::Add, S::RRImm, F::AluRri, 0x10),
    e(O::Sub, S::RRImm, F::AluRri, 0x11),
    e(O::And, S::RRImm, F::AluRri, 0x12),
    e(O::Or, S::RRImm, F::AluRri, 0x13),
    e(O::Xor, S::RRImm, F::AluRri, 0x14),
    e(O::Setb, S::RRImm, F::AluRri, 0x15),
    e(O::Clrb, S::RRImm, F::AluRri, 0x16),
    e(O::Tglb, S::RRImm, F::AluRri, 0x17),
    e(O::Cmp, S::RImm, F::AluRi, 0x18),
    e(O::Tstb, S::RImm, F::AluRi, 0x19),
    // 0010 + ld/st + complex + modifier kind
    e(O::Ld, S::RMemM, F::MemRm, 0x10),
    e(O::Ld, S::RMemI, F::MemRi, 0x11),
    e(O::Ld, S::CrMemM, F::MemCm, 0x12),
    e(O::Ld, S::CrMemI, F::MemCi, 0x13),
    e(O::St, S::MemMR, F::MemRm, 0x14),
    e(O::St, S::MemIR, F::MemRi, 0x15),
    e(O::St, S::MemMCr, F::MemCm, 0x16),
    e(O::St, S::MemICr, F::MemCi, 0x17),
    // 0011 + op2
    e(O::Ld, S::RMemAbs, F::MemDir, 0x0C),
    e(O::St, S::MemAbsR, F::MemDir, 0x0D),
    e(O::Ld, S::CrMemAbs, F::MemCDir, 0x0E),
    e(O::St, S::MemAbsCr, F::MemCDir, 0x0F),
    // 0100 + op3
    e(O::Ld, S::RImm, F::LdiR, 0x20),
    e(O::Ld, S::DagImm, F::LdiDag, 0x21),
    e(O::Ld, S::SysImm, F::LdiSys, 0x22),
    // 01001 + shift op + reg/imm
    e(O::Lsl, S::RRR, F::ShfR, 0x48),
    e(O::Lsl, S::RRImm, F::ShfI, 0x49),
    e(O::Lsr, S::RRR, F::ShfR, 0x4A),
    e(O::Lsr, S::RRImm, F::ShfI, 0x4B),
    e(O::Asr, S::RRR, F::ShfR, 0x4C),
    e(O::Asr, S::RRImm, F::ShfI, 0x4D),
    e(O::Rol, S::RRR, F::ShfR, 0x4E),
    e(O::Rol, S::RRImm, F::ShfI, 0x4F),
    // 0101 + op2
    e(O::Mpy, S::AccRR, F::MacRr, 0x14),
    e(O::Mac, S::AccRR, F::MacRr, 0x15),
    e(O::Mas, S::AccRR, F::MacRr, 0x16),
    // 01100 + op2
    e(O::Mpy, S::AccCrCr, F::MacCc, 0x30),
    e(O::Mac, S::AccCrCr, F::MacCc, 0x31),
    e(O::Mas, S::AccCrCr, F::MacCc, 0x32),
    // 01101 + op7
    e(O::Add, S::CrCrCr, F::Cpx3, 0x680),
    e(O::Sub, S::CrCrCr, F::Cpx3, 0x681),
    e(O::Pass, S::CrCr, F::Cpx2, 0x690),
    e(O::Neg, S::CrCr, F::Cpx2, 0x691),
    e(O::Conj, S::CrCr, F::Cpx2, 0x692),
    e(O::Polar, S::CrCr, F::Cpx2, 0x693),
    e(O::Rect, S::CrCr, F::Cpx2, 0x694),
    // 01110 + op3
    e(O::Mov, S::RAccPart, F::MovRa, 0x70),
    e(O::Mov, S::AccPartR, F::MovAr, 0x71),
    e(O::Mov, S::RDag, F::MovRd, 0x72),
    e(O::Mov, S::DagR, F::MovDr, 0x73),
    e(O::Mov, S::RSys, F::MovRs, 0x74),
    e(O::Mov, S::SysR, F::MovSr, 0x75),
    e(O::Clr, S::Acc, F::AccOp, 0x3B0),
    e(O::Sat, S::Acc, F::AccOp, 0x3B1),
    e(O::Rnd, S::Acc, F::AccOp, 0x3B2),
    e(O::Modify, S::IM, F::Modify, 0x77),
    // 011110 + op2, 0111110 + op1
    e(O::Jump, S::Target, F::BrRel, 0x78),
    e(O::Call, S::Target, F::BrRel, 0x79),
    e(O::Jump, S::Index, F::BrInd, 0x7A),
    e(O::Call, S::Index, F::BrInd, 0x7B),
    e(O::Do, S::TargetCond, F::Do, 0x7C),
    e(O::Rts, S::Bare, F::Ret, 0x7D),
    // 0111111 + op5
    e(O::Ena, S::ModeBit, F::Mode, 0x7E0),
    e(O::Dis, S::ModeBit, F::Mode, 0x7E1),
    e(O::Nop, S::Bare, F::Sys, 0x7E2),
    e(O::Idle, S::Bare, F::Sys, 0x7E3),
    e(O::Reset, S::Bare, F::Sys, 0x7E4),
    e(O::Push, S::Sts, F::Sys, 0x7E5),
    e(O::Pop, S::Sts, F::Sys, 0x7E6),
];

pub static BUNDLES: &[BundleEntry] = &[
    BundleEntry { shape: BundleShape::AluLd, format: F::BAluLd, fixed: 0x8 },
    BundleEntry { shape: BundleShape::AluSt, format: F::BAluSt, fixed: 0x9 },
    BundleEntry { shape: BundleShape::MacLd, format: F::BMacLd, fixed: 0xA },
    BundleEntry { shape: BundleShape::MacSt, format: F::BMacSt, fixed: 0xB },
    BundleEntry { shape: BundleShape::MacLdLd, format: F::BMacLdLd, fixed: 0xC },
    BundleEntry { shape: BundleShape::ShfLd, format: F::BShfLd, fixed: 0xD },
    BundleEntry { shape: BundleShape::ShfSt, format: F::BShfSt, fixed: 0xE },
    BundleEntry { shape: BundleShape::AluMac, format: F::BAluMac, fixed: 0xF },
];

pub fn lookup(opcode: Opcode, shape: Shape) -> Option<&'static FormatEntry> {
    ENTRIES.iter().find(|e| e.opcode == opcode && e.shape == shape)
}

pub fn lookup_bundle(shape: BundleShape) -> Option<&'static BundleEntry> {
    BUNDLES.iter().find(|b| b.shape == shape)
}

/// Finds the entry whose fixed bits lead `word`.
pub fn match_word(word: u32) -> Option<(FormatId, u32)> {
    let single = ENTRIES.iter().map(|e| (e.format, e.fixed));
    let bundle = BUNDLES.iter().map(|b| (b.format, b.fixed));
    single.chain(bundle).find(|&(format, fixed)| {
        let w = format.layout().fixed_width() as u32;
        w > 0 && word >> (WORD_BITS - w) == fixed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_indexed_by_id() {
        for (i, l) in LAYOUTS.iter().enumerate() {
            assert_eq!(l.id as usize, i, "{}", l.tag);
        }
    }

    #[test]
    fn signs_bound_immediates() {
        assert!(Sign::Signed.fits(-256, 9));
        assert!(!Sign::Signed.fits(256, 9));
        assert!(Sign::Unsigned.fits(31, 5));
        assert!(!Sign::Unsigned.fits(-1, 5));
        assert!(Sign::Either.fits(0xFFFF, 16));
        assert!(Sign::Either.fits(-0x8000, 16));
        assert!(!Sign::Either.fits(0x10000, 16));
    }
}

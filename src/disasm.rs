//! Word decoder: the inverse of the format table.

use crate::encoder::ERROR_WORD;
use crate::instructions::Opcode;
use crate::isa::formats::{Arg, FieldKind, FormatId, Layout, Role, Sign, BUNDLES, ENTRIES, WORD_BITS};
use crate::isa::shape::{role_shape, Shape, Slot};
use crate::lanes::sign_extend;
use crate::operand::{
    AccPart, AddrMode, Condition, Keyword, MemRef, ModeBit, MulMode, Operand, Reg, RegClass,
    SysReg, Target,
};
use crate::record::InstructionRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub format: FormatId,
    pub word: u32,
    pub record: InstructionRecord,
}

/// One member's operands while its fields are read.
#[derive(Debug)]
struct Partial {
    role: Role,
    opcode: Opcode,
    shape: Shape,
    ops: Vec<Option<Operand>>,
    acc: Option<u8>,
    part: Option<AccPart>,
    i: Option<u8>,
    m: Option<u8>,
    pre: bool,
    step: Option<i32>,
    addr: Option<u32>,
    mode: Option<MulMode>,
    conj: bool,
}

impl Partial {
    fn new(role: Role, opcode: Opcode, shape: Shape) -> Self {
        Self {
            role,
            opcode,
            shape,
            ops: vec![None; shape.slots().len()],
            acc: None,
            part: None,
            i: None,
            m: None,
            pre: false,
            step: None,
            addr: None,
            mode: None,
            conj: false,
        }
    }

    fn slot_index(&self, arg: Arg) -> Option<usize> {
        match arg {
            Arg::Nth(n) => Some(n as usize),
            Arg::Mem => self.shape.mem_slot(),
            Arg::Data => self.shape.data_slot(),
        }
    }

    fn set(&mut self, arg: Arg, op: Operand) -> Option<()> {
        let idx = self.slot_index(arg)?;
        *self.ops.get_mut(idx)? = Some(op);
        Some(())
    }

    fn reg(&mut self, arg: Arg, index: u32) -> Option<()> {
        let idx = self.slot_index(arg)?;
        let index = u8::try_from(index).ok()?;
        let class = match self.shape.slots().get(idx)? {
            Slot::R => RegClass::R,
            Slot::Cr => RegClass::Cr,
            Slot::Acc => RegClass::Acc,
            Slot::I => RegClass::I,
            Slot::M => RegClass::M,
            Slot::AccPart => {
                self.acc = Some(index);
                return Some(());
            }
            _ => return None,
        };
        if index >= class.count() {
            return None;
        }
        self.set(arg, Operand::Reg(Reg::new(class, index)))
    }

    fn finish(mut self, cond: Condition) -> Option<InstructionRecord> {
        let slots = self.shape.slots();
        if let Some(idx) = slots.iter().position(|s| *s == Slot::AccPart) {
            self.ops[idx] = Some(Operand::AccPart(self.acc?, self.part?));
        }
        if let Some(idx) = self.shape.mem_slot() {
            let mode = match (slots[idx], self.addr) {
                (Slot::MemAbs, Some(a)) => AddrMode::Direct(a),
                (Slot::MemM, _) if self.pre => AddrMode::Pre { i: self.i?, m: self.m? },
                (Slot::MemM, _) => AddrMode::Post { i: self.i?, m: self.m? },
                (Slot::MemI, _) if self.pre => AddrMode::PreImm { i: self.i?, step: self.step? },
                (Slot::MemI, _) => AddrMode::PostImm { i: self.i?, step: self.step? },
                _ => return None,
            };
            self.ops[idx] = Some(Operand::Mem(MemRef::dm(mode)));
        }
        if let Some(idx) = slots.iter().position(|s| *s == Slot::Sts) {
            self.ops[idx] = Some(Operand::Key(Keyword::Sts));
        }
        let mut operands = self.ops.into_iter().collect::<Option<Vec<_>>>()?;
        if self.shape.needs_mode() {
            operands.push(Operand::Key(Keyword::Mul(self.mode.unwrap_or(MulMode::Ss))));
        }
        let mut rec = InstructionRecord::new(0, self.opcode, operands);
        rec.conjugate = self.conj;
        rec.condition = Some(cond);
        Some(rec)
    }
}

fn bits(word: u32, msb_offset: u32, width: u8) -> u32 {
    if width == 0 {
        return 0;
    }
    let shift = WORD_BITS - msb_offset - width as u32;
    (word >> shift) & (((1u64 << width) - 1) as u32)
}

fn fits_prefix(layout: &Layout, fixed: u32, word: u32) -> bool {
    let w = layout.fixed_width() as u32;
    w > 0 && word >> (WORD_BITS - w) == fixed
}

/// Decodes one instruction word found at program address `addr`.
/// Relative targets come back as absolute addresses.
/// The encoder's error word never decodes.
pub fn decode_word(word: u32, addr: u32) -> Option<Decoded> {
    if word == ERROR_WORD {
        return None;
    }
    if let Some(e) = ENTRIES.iter().find(|e| fits_prefix(e.format.layout(), e.fixed, word)) {
        let mut p = Partial::new(Role::Op, e.opcode, e.shape);
        let cond = read_fields(e.format.layout(), word, addr, std::slice::from_mut(&mut p))?;
        let mut record = p.finish(cond)?;
        record.program_addr = addr;
        record.format = Some(e.format);
        return Some(Decoded { format: e.format, word, record });
    }
    let b = BUNDLES.iter().find(|b| fits_prefix(b.format.layout(), b.fixed, word))?;
    let mut parts: Vec<Partial> = b
        .shape
        .roles()
        .iter()
        .map(|&role| {
            let opcode = match role {
                Role::Ld | Role::Ld2 => Opcode::Ld,
                Role::St => Opcode::St,
                _ => Opcode::Nop,
            };
            Partial::new(role, opcode, role_shape(role))
        })
        .collect();
    let cond = read_fields(b.format.layout(), word, addr, &mut parts)?;
    let mut members = parts
        .into_iter()
        .map(|p| p.finish(cond))
        .collect::<Option<Vec<_>>>()?
        .into_iter();
    let mut head = members.next()?;
    head.bundle = members.collect();
    head.program_addr = addr;
    head.format = Some(b.format);
    Some(Decoded { format: b.format, word, record: head })
}

fn read_fields(layout: &Layout, word: u32, addr: u32, parts: &mut [Partial]) -> Option<Condition> {
    let mut cond = Condition::True;
    let mut off = 0u32;
    for f in layout.fields {
        let v = bits(word, off, f.width);
        off += f.width as u32;
        match f.kind {
            FieldKind::Opcode | FieldKind::Pad => continue,
            FieldKind::Cond => {
                cond = Condition::from_code(v)?;
                continue;
            }
            _ => {}
        }
        let p = parts.iter_mut().find(|p| p.role == f.role)?;
        match f.kind {
            FieldKind::Reg { base } => p.reg(f.arg, v + base as u32)?,
            FieldKind::AccPair => p.set(f.arg, Operand::acc(u8::try_from(v * 2).ok()?))?,
            FieldKind::Dag => {
                let class = RegClass::from_dag_code(v >> 3)?;
                p.set(f.arg, Operand::Reg(Reg::new(class, (v & 7) as u8)))?
            }
            FieldKind::Sys => p.set(f.arg, Operand::Sys(SysReg::from_code(v)?))?,
            FieldKind::Part => p.part = Some(AccPart::from_code(v)?),
            FieldKind::Imm(sign) => {
                let x = match sign {
                    Sign::Unsigned => v as i64,
                    Sign::Signed | Sign::Either => sign_extend(v as i64, f.width as u32),
                };
                p.set(f.arg, Operand::Imm(x))?
            }
            FieldKind::Addr => p.addr = Some(v),
            FieldKind::PcRel => {
                let rel = sign_extend(v as i64, f.width as u32);
                let target = u32::try_from(addr as i64 + rel).ok()?;
                p.set(f.arg, Operand::Target(Target::Abs(target)))?
            }
            FieldKind::LoopEnd => p.set(f.arg, Operand::Target(Target::Abs(addr + 1 + v)))?,
            FieldKind::Index { base } => p.i = Some(v as u8 + base),
            FieldKind::Modify { base } => p.m = Some(v as u8 + base),
            FieldKind::Pre => p.pre = v == 1,
            FieldKind::Step => p.step = Some(sign_extend(v as i32, f.width as u32)),
            FieldKind::Mode => p.mode = Some(MulMode::from_code(v)?),
            FieldKind::Conj => p.conj = v == 1,
            FieldKind::SubOp(table) => p.opcode = *table.get(v as usize)?,
            FieldKind::ModeBit => p.set(f.arg, Operand::Key(Keyword::Mode(ModeBit::from_code(v)?)))?,
            FieldKind::TermCond => p.set(f.arg, Operand::Cond(Condition::from_code(v)?))?,
            FieldKind::Opcode | FieldKind::Pad | FieldKind::Cond => {}
        }
    }
    Some(cond)
}

/// Source-like rendering of a decoded word.
pub fn fmt_decoded(d: &Decoded) -> String {
    d.record.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_extraction_is_msb_first() {
        assert_eq!(bits(0x8000_0000, 0, 1), 1);
        assert_eq!(bits(0x0000_001F, 27, 5), 0x1F);
        assert_eq!(bits(0x00F0_0000, 8, 4), 0xF);
        assert_eq!(bits(0xFFFF_FFFF, 5, 0), 0);
    }

    #[test]
    fn alu3r_word_decodes() {
        let d = decode_word(0x0000_045F, 0x20).unwrap();
        assert_eq!(d.format, FormatId::Alu3r);
        assert_eq!(fmt_decoded(&d), "ADD R0, R1, R2");
        assert_eq!(d.record.program_addr, 0x20);
    }
}

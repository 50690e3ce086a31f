//! Operand-shape classification.
//!
//! The encoder and the execution engine both call [`select`]; there is no
//! second classifier to drift out of sync.

use crate::error::{ShapeError, StructuralError};
use crate::instructions::Opcode;
use crate::isa::formats::{self, Arg, Field, FieldKind, FormatId, Layout, Role, ALU3, MAC2, SHF2};
use crate::operand::{AddrMode, Condition, Keyword, MemRef, MulMode, Operand, Reg, RegClass, Space};
use crate::record::InstructionRecord;

/// One operand position of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    R,
    Cr,
    Acc,
    AccPart,
    I,
    M,
    /// Any of I, M, L, B.
    Dag,
    Sys,
    Imm,
    MemAbs,
    MemM,
    MemI,
    Target,
    Cond,
    Sts,
    ModeBit,
}

impl Slot {
    pub fn accepts(self, op: &Operand) -> bool {
        match (self, op) {
            (Slot::R, Operand::Reg(r)) => r.class == RegClass::R,
            (Slot::Cr, Operand::Reg(r)) => r.class == RegClass::Cr,
            (Slot::Acc, Operand::Reg(r)) => r.class == RegClass::Acc,
            (Slot::I, Operand::Reg(r)) => r.class == RegClass::I,
            (Slot::M, Operand::Reg(r)) => r.class == RegClass::M,
            (Slot::Dag, Operand::Reg(r)) => r.class.is_dag(),
            (Slot::AccPart, Operand::AccPart(..)) => true,
            (Slot::Sys, Operand::Sys(_)) => true,
            (Slot::Imm, Operand::Imm(_)) => true,
            (Slot::MemAbs, Operand::Mem(m)) => {
                matches!(m.mode, AddrMode::Direct(_) | AddrMode::Symbol(_))
            }
            (Slot::MemM, Operand::Mem(m)) => {
                matches!(m.mode, AddrMode::Post { .. } | AddrMode::Pre { .. })
            }
            (Slot::MemI, Operand::Mem(m)) => {
                matches!(m.mode, AddrMode::PostImm { .. } | AddrMode::PreImm { .. })
            }
            (Slot::Target, Operand::Target(_)) => true,
            (Slot::Cond, Operand::Cond(_)) => true,
            (Slot::Sts, Operand::Key(Keyword::Sts)) => true,
            (Slot::ModeBit, Operand::Key(Keyword::Mode(_))) => true,
            _ => false,
        }
    }

    fn is_mem(self) -> bool {
        matches!(self, Slot::MemAbs | Slot::MemM | Slot::MemI)
    }
}

/// Classified operand list, multiply mode option excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Bare,
    R,
    Acc,
    Index,
    Target,
    Sts,
    ModeBit,
    RR,
    CrCr,
    RImm,
    DagImm,
    SysImm,
    IM,
    RAccPart,
    AccPartR,
    RDag,
    DagR,
    RSys,
    SysR,
    RMemAbs,
    MemAbsR,
    CrMemAbs,
    MemAbsCr,
    RMemM,
    MemMR,
    RMemI,
    MemIR,
    CrMemM,
    MemMCr,
    CrMemI,
    MemICr,
    TargetCond,
    RRR,
    RRImm,
    CrCrCr,
    AccRR,
    AccCrCr,
}

impl Shape {
    pub const ALL: &'static [Shape] = &[
        Shape::Bare,
        Shape::R,
        Shape::Acc,
        Shape::Index,
        Shape::Target,
        Shape::Sts,
        Shape::ModeBit,
        Shape::RR,
        Shape::CrCr,
        Shape::RImm,
        Shape::DagImm,
        Shape::SysImm,
        Shape::IM,
        Shape::RAccPart,
        Shape::AccPartR,
        Shape::RDag,
        Shape::DagR,
        Shape::RSys,
        Shape::SysR,
        Shape::RMemAbs,
        Shape::MemAbsR,
        Shape::CrMemAbs,
        Shape::MemAbsCr,
        Shape::RMemM,
        Shape::MemMR,
        Shape::RMemI,
        Shape::MemIR,
        Shape::CrMemM,
        Shape::MemMCr,
        Shape::CrMemI,
        Shape::MemICr,
        Shape::TargetCond,
        Shape::RRR,
        Shape::RRImm,
        Shape::CrCrCr,
        Shape::AccRR,
        Shape::AccCrCr,
    ];

    pub fn slots(self) -> &'static [Slot] {
        use Slot::*;
        match self {
            Shape::Bare => &[],
            Shape::R => &[R],
            Shape::Acc => &[Acc],
            Shape::Index => &[I],
            Shape::Target => &[Target],
            Shape::Sts => &[Sts],
            Shape::ModeBit => &[ModeBit],
            Shape::RR => &[R, R],
            Shape::CrCr => &[Cr, Cr],
            Shape::RImm => &[R, Imm],
            Shape::DagImm => &[Dag, Imm],
            Shape::SysImm => &[Sys, Imm],
            Shape::IM => &[I, M],
            Shape::RAccPart => &[R, AccPart],
            Shape::AccPartR => &[AccPart, R],
            Shape::RDag => &[R, Dag],
            Shape::DagR => &[Dag, R],
            Shape::RSys => &[R, Sys],
            Shape::SysR => &[Sys, R],
            Shape::RMemAbs => &[R, MemAbs],
            Shape::MemAbsR => &[MemAbs, R],
            Shape::CrMemAbs => &[Cr, MemAbs],
            Shape::MemAbsCr => &[MemAbs, Cr],
            Shape::RMemM => &[R, MemM],
            Shape::MemMR => &[MemM, R],
            Shape::RMemI => &[R, MemI],
            Shape::MemIR => &[MemI, R],
            Shape::CrMemM => &[Cr, MemM],
            Shape::MemMCr => &[MemM, Cr],
            Shape::CrMemI => &[Cr, MemI],
            Shape::MemICr => &[MemI, Cr],
            Shape::TargetCond => &[Target, Cond],
            Shape::RRR => &[R, R, R],
            Shape::RRImm => &[R, R, Imm],
            Shape::CrCrCr => &[Cr, Cr, Cr],
            Shape::AccRR => &[Acc, R, R],
            Shape::AccCrCr => &[Acc, Cr, Cr],
        }
    }

    pub fn needs_mode(self) -> bool {
        matches!(self, Shape::AccRR | Shape::AccCrCr)
    }

    pub fn mem_slot(self) -> Option<usize> {
        self.slots().iter().position(|s| s.is_mem())
    }

    /// Register moved by a load or store shape.
    pub fn data_slot(self) -> Option<usize> {
        self.mem_slot().map(|m| 1 - m)
    }

    pub fn is_complex(self) -> bool {
        self.slots().contains(&Slot::Cr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleShape {
    AluLd,
    AluSt,
    MacLd,
    MacSt,
    MacLdLd,
    ShfLd,
    ShfSt,
    AluMac,
}

impl BundleShape {
    /// Member roles in the order the layout emits them.
    pub fn roles(self) -> &'static [Role] {
        match self {
            BundleShape::AluLd => &[Role::Alu, Role::Ld],
            BundleShape::AluSt => &[Role::Alu, Role::St],
            BundleShape::MacLd => &[Role::Mac, Role::Ld],
            BundleShape::MacSt => &[Role::Mac, Role::St],
            BundleShape::MacLdLd => &[Role::Mac, Role::Ld, Role::Ld2],
            BundleShape::ShfLd => &[Role::Shf, Role::Ld],
            BundleShape::ShfSt => &[Role::Shf, Role::St],
            BundleShape::AluMac => &[Role::Alu, Role::Mac],
        }
    }
}

/// Fixed shape of each bundle member role.
pub fn role_shape(role: Role) -> Shape {
    match role {
        Role::Alu => Shape::RRR,
        Role::Mac => Shape::AccRR,
        Role::Shf => Shape::RRImm,
        Role::Ld | Role::Ld2 => Shape::RMemM,
        Role::St => Shape::MemMR,
        Role::Op => Shape::Bare,
    }
}

/// One operation of an instruction word with its resolved shape.
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
    pub role: Role,
    pub rec: &'a InstructionRecord,
    pub shape: Shape,
    pub mode: Option<MulMode>,
}

impl<'a> Member<'a> {
    pub fn opcode(&self) -> Opcode {
        self.rec.opcode
    }

    fn nth(&self, idx: usize) -> Option<&'a Operand> {
        self.rec
            .operands
            .iter()
            .filter(|o| !matches!(o, Operand::Key(Keyword::Mul(_))))
            .nth(idx)
    }

    pub fn operand(&self, arg: Arg) -> Option<&'a Operand> {
        let idx = match arg {
            Arg::Nth(n) => n as usize,
            Arg::Mem => self.shape.mem_slot()?,
            Arg::Data => self.shape.data_slot()?,
        };
        self.nth(idx)
    }

    pub fn reg(&self, n: u8) -> Option<Reg> {
        self.operand(Arg::Nth(n)).and_then(Operand::as_reg)
    }

    pub fn imm(&self, n: u8) -> Option<i64> {
        match self.operand(Arg::Nth(n)) {
            Some(Operand::Imm(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn mem(&self) -> Option<&'a MemRef> {
        match self.operand(Arg::Mem) {
            Some(Operand::Mem(m)) => Some(m),
            _ => None,
        }
    }

    pub fn data_reg(&self) -> Option<Reg> {
        self.operand(Arg::Data).and_then(Operand::as_reg)
    }

    pub fn mul_mode(&self) -> MulMode {
        self.mode.unwrap_or(MulMode::Ss)
    }
}

/// The resolved format of a record and the members feeding its fields.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub format: FormatId,
    pub fixed: u32,
    pub head: &'a InstructionRecord,
    pub members: Vec<Member<'a>>,
}

impl<'a> Selection<'a> {
    pub fn layout(&self) -> &'static Layout {
        self.format.layout()
    }

    pub fn member(&self, role: Role) -> Option<&Member<'a>> {
        self.members.iter().find(|m| m.role == role)
    }

    pub fn is_bundle(&self) -> bool {
        self.format.is_bundle()
    }
}

fn no_format(rec: &InstructionRecord) -> ShapeError {
    ShapeError::NoFormat {
        opcode: rec.opcode,
        operands: crate::operand::render(&rec.operands),
    }
}

/// Splits off the multiply mode and matches the remaining operands.
pub fn classify(rec: &InstructionRecord) -> Result<(Shape, Option<MulMode>), ShapeError> {
    let mut mode = None;
    let mut ops: Vec<&Operand> = Vec::with_capacity(rec.operands.len());
    for op in &rec.operands {
        match op {
            Operand::Key(Keyword::Mul(m)) if mode.is_none() => mode = Some(*m),
            Operand::Mem(MemRef { space: Space::Pm, .. }) => {
                return Err(ShapeError::ProgramMemory { token: op.to_string() })
            }
            _ if !op.regs_in_range() => {
                return Err(ShapeError::RegisterNotAllowed { token: op.to_string() })
            }
            _ => ops.push(op),
        }
    }
    let shape = Shape::ALL
        .iter()
        .copied()
        .find(|s| {
            let slots = s.slots();
            slots.len() == ops.len() && slots.iter().zip(&ops).all(|(sl, op)| sl.accepts(op))
        })
        .ok_or_else(|| no_format(rec))?;
    Ok((shape, mode))
}

/// Bundles hold at most two siblings, share the word's condition and never
/// write one register twice.
pub fn check_structure(rec: &InstructionRecord) -> Result<(), StructuralError> {
    if rec.bundle.len() > 2 {
        return Err(StructuralError::BundleTooLarge(rec.bundle.len()));
    }
    if rec.bundle.is_empty() {
        return Ok(());
    }
    let head = rec.cond();
    if let Some(c) = rec.bundle.iter().filter_map(|s| s.condition).find(|&c| c != head) {
        return Err(StructuralError::MixedCondition(c.to_string()));
    }
    let mut seen: Vec<Reg> = Vec::new();
    for r in rec.members() {
        if r.opcode == Opcode::St {
            continue;
        }
        if let Some(Operand::Reg(d)) = r.operands.first() {
            if seen.contains(d) {
                return Err(StructuralError::DuplicateDestination(d.to_string()));
            }
            seen.push(*d);
        }
    }
    Ok(())
}

pub fn select(rec: &InstructionRecord) -> Result<Selection<'_>, ShapeError> {
    if rec.bundle.is_empty() {
        select_single(rec)
    } else {
        select_bundle(rec)
    }
}

fn select_single(rec: &InstructionRecord) -> Result<Selection<'_>, ShapeError> {
    let (shape, mode) = classify(rec)?;
    let entry = formats::lookup(rec.opcode, shape).ok_or_else(|| no_format(rec))?;
    if shape.needs_mode() && mode.is_none() {
        return Err(ShapeError::MissingOption { opcode: rec.opcode });
    }
    if !shape.needs_mode() && mode.is_some() {
        return Err(no_format(rec));
    }
    let member = Member { role: Role::Op, rec, shape, mode };
    check_operands(&member)?;
    let sel = Selection {
        format: entry.format,
        fixed: entry.fixed,
        head: rec,
        members: vec![member],
    };
    if !sel.layout().has_cond() && rec.cond() != Condition::True {
        return Err(ShapeError::Unconditional { opcode: rec.opcode });
    }
    validate(&sel)?;
    Ok(sel)
}

/// Constraints that no field width expresses.
fn check_operands(m: &Member) -> Result<(), ShapeError> {
    let token = |n: u8| m.operand(Arg::Nth(n)).map(|o| o.to_string()).unwrap_or_default();
    match (m.opcode(), m.shape) {
        (Opcode::Divs | Opcode::Divq, _) => {
            // Rd and Rd+1 form the remainder/quotient pair
            if m.reg(0).is_some_and(|r| r.index % 2 != 0) {
                return Err(ShapeError::RegisterNotAllowed { token: token(0) });
            }
        }
        (Opcode::Setb | Opcode::Clrb | Opcode::Tglb, _) | (Opcode::Tstb, _) => {
            let n = if m.opcode() == Opcode::Tstb { 1 } else { 2 };
            if m.imm(n).is_some_and(|b| !(0..12).contains(&b)) {
                return Err(ShapeError::OutOfRange { token: token(n), width: 4 });
            }
        }
        (_, Shape::SysR | Shape::SysImm) => {
            if let Some(Operand::Sys(s)) = m.operand(Arg::Nth(0)) {
                if !s.writable() {
                    return Err(ShapeError::RegisterNotAllowed { token: token(0) });
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn select_bundle(rec: &InstructionRecord) -> Result<Selection<'_>, ShapeError> {
    let mut members = Vec::with_capacity(rec.bundle.len() + 1);
    for r in rec.members() {
        let (shape, mode) = classify(r)?;
        let role = bundle_role(r, shape)?;
        if role == Role::Mac && mode.is_none() {
            return Err(ShapeError::MissingOption { opcode: r.opcode });
        }
        if role != Role::Mac && mode.is_some() {
            return Err(no_format(r));
        }
        members.push(Member { role, rec: r, shape, mode });
    }
    // the load into the higher register takes the second load slot
    let loads: Vec<usize> = (0..members.len()).filter(|&i| members[i].role == Role::Ld).collect();
    if let [a, b] = loads[..] {
        let key = |i: usize| members[i].data_reg().map(|r| r.index).unwrap_or(0);
        let second = if key(b) >= key(a) { b } else { a };
        members[second].role = Role::Ld2;
    }
    let shape = bundle_shape(&members).ok_or_else(|| ShapeError::Bundle {
        opcode: rec.opcode,
        shape: members
            .iter()
            .map(|m| m.opcode().mnemonic())
            .collect::<Vec<_>>()
            .join("+"),
    })?;
    let entry = formats::lookup_bundle(shape).ok_or_else(|| no_format(rec))?;
    let sel = Selection {
        format: entry.format,
        fixed: entry.fixed,
        head: rec,
        members,
    };
    validate(&sel)?;
    Ok(sel)
}

fn bundle_role(r: &InstructionRecord, shape: Shape) -> Result<Role, ShapeError> {
    let op = r.opcode;
    if matches!(op, Opcode::Ld | Opcode::St) && shape.mem_slot().is_some() {
        let mem_token = || {
            shape
                .mem_slot()
                .and_then(|i| r.operands.get(i))
                .map(|o| o.to_string())
                .unwrap_or_default()
        };
        let post = shape
            .mem_slot()
            .and_then(|i| r.operands.get(i))
            .is_some_and(|o| matches!(o, Operand::Mem(MemRef { mode: AddrMode::Post { .. }, .. })));
        return match (op, shape) {
            (Opcode::Ld, Shape::RMemM) if post => Ok(Role::Ld),
            (Opcode::St, Shape::MemMR) if post => Ok(Role::St),
            (_, s) if s.is_complex() => Err(ShapeError::RegisterNotAllowed {
                token: crate::operand::render(&r.operands),
            }),
            _ => Err(ShapeError::AddressingNotAllowed { token: mem_token() }),
        };
    }
    match shape {
        Shape::RRR if ALU3.contains(&op) => Ok(Role::Alu),
        Shape::AccRR if MAC2.contains(&op) => Ok(Role::Mac),
        Shape::RRImm if SHF2.contains(&op) => Ok(Role::Shf),
        _ => Err(ShapeError::Bundle {
            opcode: op,
            shape: format!("{shape:?}"),
        }),
    }
}

fn bundle_shape(members: &[Member]) -> Option<BundleShape> {
    let count = |role: Role| members.iter().filter(|m| m.role == role).count();
    let key = (
        count(Role::Alu),
        count(Role::Mac),
        count(Role::Shf),
        count(Role::Ld) + count(Role::Ld2),
        count(Role::St),
    );
    Some(match key {
        (1, 0, 0, 1, 0) => BundleShape::AluLd,
        (1, 0, 0, 0, 1) => BundleShape::AluSt,
        (0, 1, 0, 1, 0) => BundleShape::MacLd,
        (0, 1, 0, 0, 1) => BundleShape::MacSt,
        (0, 1, 0, 2, 0) => BundleShape::MacLdLd,
        (0, 0, 1, 1, 0) => BundleShape::ShfLd,
        (0, 0, 1, 0, 1) => BundleShape::ShfSt,
        (1, 1, 0, 0, 0) => BundleShape::AluMac,
        _ => return None,
    })
}

/// Checks every non-relocatable field against its width.
fn validate(sel: &Selection) -> Result<(), ShapeError> {
    for f in sel.layout().fields {
        field_value(f, sel)?;
    }
    Ok(())
}

fn width_mask(width: u8) -> u32 {
    ((1u64 << width) - 1) as u32
}

/// Raw value of one field; `None` for relocatable fields, which the
/// encoder fills in once addresses are known.
pub fn field_value(field: &Field, sel: &Selection) -> Result<Option<u32>, ShapeError> {
    if field.is_reloc() {
        return Ok(None);
    }
    let v = match field.kind {
        FieldKind::Opcode => sel.fixed,
        FieldKind::Pad => 0,
        FieldKind::Cond => sel.head.cond().code(),
        _ => {
            let m = sel.member(field.role).ok_or_else(|| no_format(sel.head))?;
            member_field(field, m)?
        }
    };
    Ok(Some(v))
}

fn member_field(field: &Field, m: &Member) -> Result<u32, ShapeError> {
    let w = field.width;
    let operand = || m.operand(field.arg).ok_or_else(|| no_format(m.rec));
    let fit = |v: i64, token: &Operand| {
        if (0..(1i64 << w)).contains(&v) {
            Ok(v as u32)
        } else {
            Err(ShapeError::RegisterNotAllowed { token: token.to_string() })
        }
    };
    let mem = || m.mem().ok_or_else(|| no_format(m.rec));
    let v = match field.kind {
        FieldKind::Reg { base } => {
            let o = operand()?;
            let idx = match o {
                Operand::Reg(r) => r.index,
                Operand::AccPart(a, _) => *a,
                _ => return Err(no_format(m.rec)),
            };
            fit(idx as i64 - base as i64, o)?
        }
        FieldKind::AccPair => {
            let o = operand()?;
            match o.as_reg() {
                Some(r) if r.index % 2 == 0 => fit(r.index as i64 / 2, o)?,
                _ => return Err(ShapeError::RegisterNotAllowed { token: o.to_string() }),
            }
        }
        FieldKind::Dag => match operand()? {
            Operand::Reg(r) if r.class.is_dag() => r.code(),
            _ => return Err(no_format(m.rec)),
        },
        FieldKind::Sys => match operand()? {
            Operand::Sys(s) => s.code(),
            _ => return Err(no_format(m.rec)),
        },
        FieldKind::Part => match operand()? {
            Operand::AccPart(_, p) => p.code(),
            _ => return Err(no_format(m.rec)),
        },
        FieldKind::Imm(sign) => {
            let o = operand()?;
            let Operand::Imm(v) = o else {
                return Err(no_format(m.rec));
            };
            if !sign.fits(*v, w) {
                return Err(ShapeError::OutOfRange { token: o.to_string(), width: w });
            }
            (*v as u32) & width_mask(w)
        }
        FieldKind::Index { base } => {
            let mref = mem()?;
            let i = mref.mode.index_reg().ok_or_else(|| no_format(m.rec))?;
            let token = Operand::Mem(mref.clone());
            fit(i as i64 - base as i64, &token)?
        }
        FieldKind::Modify { base } => {
            let mref = mem()?;
            let mi = match mref.mode {
                AddrMode::Post { m: mi, .. } | AddrMode::Pre { m: mi, .. } => mi,
                _ => return Err(no_format(m.rec)),
            };
            fit(mi as i64 - base as i64, &Operand::Mem(mref.clone()))?
        }
        FieldKind::Pre => {
            matches!(mem()?.mode, AddrMode::Pre { .. } | AddrMode::PreImm { .. }) as u32
        }
        FieldKind::Step => {
            let mref = mem()?;
            match mref.mode {
                AddrMode::PostImm { step, .. } | AddrMode::PreImm { step, .. } => {
                    if !formats::Sign::Signed.fits(step as i64, w) {
                        return Err(ShapeError::OutOfRange { token: mref.to_string(), width: w });
                    }
                    (step as u32) & width_mask(w)
                }
                _ => return Err(no_format(m.rec)),
            }
        }
        FieldKind::Mode => {
            let mode = m.mul_mode();
            if w == 0 {
                if mode != MulMode::Ss {
                    return Err(ShapeError::OutOfRange { token: format!("({})", mode.name()), width: 0 });
                }
                0
            } else {
                mode.code()
            }
        }
        FieldKind::Conj => m.rec.conjugate as u32,
        FieldKind::SubOp(table) => match table.iter().position(|&o| o == m.opcode()) {
            Some(p) => p as u32,
            None => {
                return Err(ShapeError::Bundle {
                    opcode: m.opcode(),
                    shape: format!("{:?}", m.role),
                })
            }
        },
        FieldKind::ModeBit => match operand()? {
            Operand::Key(Keyword::Mode(b)) => b.code(),
            _ => return Err(no_format(m.rec)),
        },
        FieldKind::TermCond => match operand()? {
            Operand::Cond(c) => c.code(),
            _ => return Err(no_format(m.rec)),
        },
        FieldKind::Opcode
        | FieldKind::Pad
        | FieldKind::Cond
        | FieldKind::Addr
        | FieldKind::PcRel
        | FieldKind::LoopEnd => 0,
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::{AccPart, ModeBit, SysReg, Target};

    fn sample(slot: Slot) -> Operand {
        match slot {
            Slot::R => Operand::r(1),
            Slot::Cr => Operand::cr(1),
            Slot::Acc => Operand::acc(0),
            Slot::AccPart => Operand::AccPart(0, AccPart::H),
            Slot::I => Operand::Reg(Reg::new(RegClass::I, 0)),
            Slot::M => Operand::Reg(Reg::new(RegClass::M, 0)),
            Slot::Dag => Operand::Reg(Reg::new(RegClass::L, 1)),
            Slot::Sys => Operand::Sys(SysReg::Cntr),
            Slot::Imm => Operand::Imm(3),
            Slot::MemAbs => Operand::Mem(MemRef::dm(AddrMode::Direct(4))),
            Slot::MemM => Operand::Mem(MemRef::dm(AddrMode::Post { i: 0, m: 0 })),
            Slot::MemI => Operand::Mem(MemRef::dm(AddrMode::PostImm { i: 0, step: 1 })),
            Slot::Target => Operand::Target(Target::Abs(4)),
            Slot::Cond => Operand::Cond(Condition::Ce),
            Slot::Sts => Operand::Key(Keyword::Sts),
            Slot::ModeBit => Operand::Key(Keyword::Mode(ModeBit::AluSat)),
        }
    }

    #[test]
    fn every_shape_classifies_to_itself() {
        for &shape in Shape::ALL {
            let ops = shape.slots().iter().map(|&s| sample(s)).collect();
            let rec = InstructionRecord::new(1, Opcode::Nop, ops);
            assert_eq!(classify(&rec).map(|(s, _)| s), Ok(shape));
        }
    }

    #[test]
    fn mode_option_is_split_off() {
        let rec = InstructionRecord::new(
            1,
            Opcode::Mac,
            vec![Operand::acc(0), Operand::r(1), Operand::r(2), Operand::Key(Keyword::Mul(MulMode::Rnd))],
        );
        assert_eq!(classify(&rec), Ok((Shape::AccRR, Some(MulMode::Rnd))));
    }

    #[test]
    fn program_memory_is_rejected() {
        let rec = InstructionRecord::new(
            1,
            Opcode::Ld,
            vec![Operand::r(0), Operand::Mem(MemRef { space: Space::Pm, mode: AddrMode::Post { i: 0, m: 0 } })],
        );
        assert!(matches!(classify(&rec), Err(ShapeError::ProgramMemory { .. })));
    }

    #[test]
    fn register_numbers_stay_inside_their_file() {
        let i9 = Operand::Reg(Reg::new(RegClass::I, 9));
        let rec = InstructionRecord::new(1, Opcode::Ld, vec![i9, Operand::imm(5)]);
        assert_eq!(classify(&rec), Err(ShapeError::RegisterNotAllowed { token: "I9".into() }));

        let mref = Operand::Mem(MemRef::dm(AddrMode::Post { i: 0, m: 8 }));
        let rec = InstructionRecord::new(1, Opcode::Ld, vec![Operand::r(1), mref]);
        assert!(matches!(classify(&rec), Err(ShapeError::RegisterNotAllowed { .. })));

        let rec = InstructionRecord::new(1, Opcode::Clr, vec![Operand::r(32)]);
        assert!(classify(&rec).is_err());
    }
}

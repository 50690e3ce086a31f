//! Tagged operands, resolved once from front-end tokens.
//!
//! Both the encoder and the execution engine classify instructions by
//! matching on these variants; nothing downstream re-parses token text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OperandParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegClass {
    /// 12-bit general data register, replicated per lane.
    R,
    /// Complex pair (R2n, R2n+1).
    Cr,
    /// 32-bit accumulator.
    Acc,
    /// DAG index register.
    I,
    /// DAG modify register.
    M,
    /// DAG length register.
    L,
    /// DAG base register.
    B,
}

impl RegClass {
    pub fn count(self) -> u8 {
        match self {
            RegClass::R => 32,
            RegClass::Cr => 16,
            RegClass::Acc | RegClass::I | RegClass::M | RegClass::L | RegClass::B => 8,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            RegClass::R => "R",
            RegClass::Cr => "CR",
            RegClass::Acc => "ACC",
            RegClass::I => "I",
            RegClass::M => "M",
            RegClass::L => "L",
            RegClass::B => "B",
        }
    }

    /// DAG registers are shared by all lanes.
    pub fn is_dag(self) -> bool {
        matches!(self, RegClass::I | RegClass::M | RegClass::L | RegClass::B)
    }

    /// Two-bit class selector used inside 5-bit DAG register codes.
    pub fn dag_code(self) -> Option<u32> {
        match self {
            RegClass::I => Some(0),
            RegClass::M => Some(1),
            RegClass::L => Some(2),
            RegClass::B => Some(3),
            _ => None,
        }
    }

    pub fn from_dag_code(code: u32) -> Option<RegClass> {
        match code {
            0 => Some(RegClass::I),
            1 => Some(RegClass::M),
            2 => Some(RegClass::L),
            3 => Some(RegClass::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reg {
    pub class: RegClass,
    pub index: u8,
}

impl Reg {
    pub const fn new(class: RegClass, index: u8) -> Self {
        Self { class, index }
    }

    /// Five-bit register code: the index, or class/index for DAG registers.
    pub fn code(self) -> u32 {
        match self.class.dag_code() {
            Some(c) => (c << 3) | self.index as u32,
            None => self.index as u32,
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class.prefix(), self.index)
    }
}

/// Accumulator sub-view: H = bits 31..24, M = 23..12, L = 11..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccPart {
    H,
    M,
    L,
}

impl AccPart {
    pub fn code(self) -> u32 {
        match self {
            AccPart::H => 0,
            AccPart::M => 1,
            AccPart::L => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(AccPart::H),
            1 => Some(AccPart::M),
            2 => Some(AccPart::L),
            _ => None,
        }
    }

    pub fn shift(self) -> u32 {
        match self {
            AccPart::H => 24,
            AccPart::M => 12,
            AccPart::L => 0,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            AccPart::H => 8,
            AccPart::M | AccPart::L => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SysReg {
    Cntr,
    Mstat,
    Astat,
    Id,
}

impl SysReg {
    pub fn code(self) -> u32 {
        match self {
            SysReg::Cntr => 0,
            SysReg::Mstat => 1,
            SysReg::Astat => 2,
            SysReg::Id => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(SysReg::Cntr),
            1 => Some(SysReg::Mstat),
            2 => Some(SysReg::Astat),
            3 => Some(SysReg::Id),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SysReg::Cntr => "CNTR",
            SysReg::Mstat => "MSTAT",
            SysReg::Astat => "ASTAT",
            SysReg::Id => "ID",
        }
    }

    pub fn writable(self) -> bool {
        matches!(self, SysReg::Cntr | SysReg::Mstat)
    }
}

/// Signedness/rounding option of multiplier instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MulMode {
    Ss,
    Su,
    Us,
    Uu,
    Rnd,
}

impl MulMode {
    pub const ALL: [MulMode; 5] = [MulMode::Ss, MulMode::Su, MulMode::Us, MulMode::Uu, MulMode::Rnd];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            MulMode::Ss => "SS",
            MulMode::Su => "SU",
            MulMode::Us => "US",
            MulMode::Uu => "UU",
            MulMode::Rnd => "RND",
        }
    }
}

/// MSTAT bits switchable with ENA/DIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeBit {
    /// ALU saturation.
    AluSat,
    /// Accumulator saturation on MV.
    MacSat,
    /// Bit-reversed output addresses for I0..I3.
    BitRev,
}

impl ModeBit {
    pub const ALL: [ModeBit; 3] = [ModeBit::AluSat, ModeBit::MacSat, ModeBit::BitRev];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ModeBit::AluSat => "AS",
            ModeBit::MacSat => "MS",
            ModeBit::BitRev => "BR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// Status registers, for PUSH/POP.
    Sts,
    Mul(MulMode),
    Mode(ModeBit),
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Sts => f.write_str("STS"),
            Keyword::Mul(m) => write!(f, "({})", m.name()),
            Keyword::Mode(m) => f.write_str(m.name()),
        }
    }
}

/// Instruction predicates; the discriminant is the 5-bit condition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Le = 3,
    Lt = 4,
    Ge = 5,
    Av = 6,
    NotAv = 7,
    Ac = 8,
    NotAc = 9,
    Neg = 10,
    Pos = 11,
    Mv = 12,
    NotMv = 13,
    Sv = 14,
    NotSv = 15,
    Ce = 16,
    NotCe = 17,
    Aq = 18,
    NotAq = 19,
    Forever = 30,
    True = 31,
}

const CONDITIONS: &[(Condition, &str)] = &[
    (Condition::Eq, "EQ"),
    (Condition::Ne, "NE"),
    (Condition::Gt, "GT"),
    (Condition::Le, "LE"),
    (Condition::Lt, "LT"),
    (Condition::Ge, "GE"),
    (Condition::Av, "AV"),
    (Condition::NotAv, "NOT AV"),
    (Condition::Ac, "AC"),
    (Condition::NotAc, "NOT AC"),
    (Condition::Neg, "NEG"),
    (Condition::Pos, "POS"),
    (Condition::Mv, "MV"),
    (Condition::NotMv, "NOT MV"),
    (Condition::Sv, "SV"),
    (Condition::NotSv, "NOT SV"),
    (Condition::Ce, "CE"),
    (Condition::NotCe, "NOT CE"),
    (Condition::Aq, "AQ"),
    (Condition::NotAq, "NOT AQ"),
    (Condition::Forever, "FOREVER"),
    (Condition::True, "TRUE"),
];

impl Condition {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        CONDITIONS.iter().find(|(c, _)| c.code() == code).map(|(c, _)| *c)
    }

    pub fn name(self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, n)| *n)
            .unwrap_or("TRUE")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let norm = name.split_whitespace().collect::<Vec<_>>().join(" ");
        CONDITIONS
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(&norm))
            .map(|(c, _)| *c)
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::True
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Space {
    /// Data memory, `DM(...)`.
    Dm,
    /// Program memory, `PM(...)`; never data addressable on this core.
    Pm,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrMode {
    Direct(u32),
    /// Absolute address given by a data symbol, relocatable.
    Symbol(String),
    /// Access at I, then I += M.
    Post { i: u8, m: u8 },
    /// I += M, then access at the new I.
    Pre { i: u8, m: u8 },
    PostImm { i: u8, step: i32 },
    PreImm { i: u8, step: i32 },
}

impl AddrMode {
    pub fn index_reg(&self) -> Option<u8> {
        match self {
            AddrMode::Post { i, .. }
            | AddrMode::Pre { i, .. }
            | AddrMode::PostImm { i, .. }
            | AddrMode::PreImm { i, .. } => Some(*i),
            AddrMode::Direct(_) | AddrMode::Symbol(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemRef {
    pub space: Space,
    pub mode: AddrMode,
}

impl MemRef {
    pub fn dm(mode: AddrMode) -> Self {
        Self { space: Space::Dm, mode }
    }
}

impl fmt::Display for MemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sp = match self.space {
            Space::Dm => "DM",
            Space::Pm => "PM",
        };
        match &self.mode {
            AddrMode::Direct(a) => write!(f, "{sp}({a:#x})"),
            AddrMode::Symbol(s) => write!(f, "{sp}({s})"),
            AddrMode::Post { i, m } => write!(f, "{sp}(I{i},M{m})"),
            AddrMode::Pre { i, m } => write!(f, "{sp}(M{m},I{i})"),
            AddrMode::PostImm { i, step: 0 } => write!(f, "{sp}(I{i})"),
            AddrMode::PostImm { i, step } => write!(f, "{sp}(I{i},#{step})"),
            AddrMode::PreImm { i, step } => write!(f, "{sp}(#{step},I{i})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Label(String),
    Abs(u32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(l) => f.write_str(l),
            Target::Abs(a) => write!(f, "{a:#x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Reg(Reg),
    AccPart(u8, AccPart),
    Sys(SysReg),
    Imm(i64),
    Mem(MemRef),
    Target(Target),
    Cond(Condition),
    Key(Keyword),
}

impl Operand {
    pub fn r(index: u8) -> Self {
        Operand::Reg(Reg::new(RegClass::R, index))
    }

    pub fn cr(index: u8) -> Self {
        Operand::Reg(Reg::new(RegClass::Cr, index))
    }

    pub fn acc(index: u8) -> Self {
        Operand::Reg(Reg::new(RegClass::Acc, index))
    }

    pub fn imm(v: i64) -> Self {
        Operand::Imm(v)
    }

    pub fn label(name: &str) -> Self {
        Operand::Target(Target::Label(name.to_string()))
    }

    /// False when a register number is past the end of its file.
    pub fn regs_in_range(&self) -> bool {
        let dag = |n: u8| n < RegClass::I.count();
        match self {
            Operand::Reg(r) => r.index < r.class.count(),
            Operand::AccPart(a, _) => *a < RegClass::Acc.count(),
            Operand::Mem(mref) => match &mref.mode {
                AddrMode::Post { i, m } | AddrMode::Pre { i, m } => dag(*i) && dag(*m),
                AddrMode::PostImm { i, .. } | AddrMode::PreImm { i, .. } => dag(*i),
                AddrMode::Direct(_) | AddrMode::Symbol(_) => true,
            },
            _ => true,
        }
    }

    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn reg_class(&self) -> Option<RegClass> {
        self.as_reg().map(|r| r.class)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::AccPart(a, p) => write!(f, "ACC{a}.{p:?}"),
            Operand::Sys(s) => f.write_str(s.name()),
            Operand::Imm(v) => write!(f, "#{v}"),
            Operand::Mem(m) => write!(f, "{m}"),
            Operand::Target(t) => write!(f, "{t}"),
            Operand::Cond(c) => write!(f, "{c}"),
            Operand::Key(k) => write!(f, "{k}"),
        }
    }
}

/// Joins operands the way they appear in source, for diagnostics.
pub fn render(operands: &[Operand]) -> String {
    operands
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        t.parse::<i64>().ok()?
    };
    Some(if neg { -v } else { v })
}

fn parse_indexed(s: &str, prefix: &str, count: u8) -> Option<u8> {
    let digits = s.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (n < count).then_some(n)
}

fn parse_reg(s: &str) -> Option<Reg> {
    // Longer prefixes first so `CR1` is not read as `C` + `R1`.
    const ORDER: [RegClass; 7] = [
        RegClass::Acc,
        RegClass::Cr,
        RegClass::R,
        RegClass::I,
        RegClass::M,
        RegClass::L,
        RegClass::B,
    ];
    ORDER.iter().find_map(|&class| {
        parse_indexed(s, class.prefix(), class.count()).map(|index| Reg::new(class, index))
    })
}

fn parse_sys(s: &str) -> Option<SysReg> {
    [SysReg::Cntr, SysReg::Mstat, SysReg::Astat, SysReg::Id]
        .into_iter()
        .find(|r| r.name() == s)
}

fn parse_keyword(s: &str) -> Option<Keyword> {
    let bare = s.trim_start_matches('(').trim_end_matches(')');
    if bare == "STS" {
        return Some(Keyword::Sts);
    }
    if let Some(m) = MulMode::ALL.iter().find(|m| m.name() == bare) {
        return Some(Keyword::Mul(*m));
    }
    ModeBit::ALL
        .iter()
        .find(|m| m.name() == bare)
        .map(|m| Keyword::Mode(*m))
}

fn parse_mem(s: &str) -> Option<MemRef> {
    let (space, rest) = if let Some(r) = s.strip_prefix("DM(") {
        (Space::Dm, r)
    } else if let Some(r) = s.strip_prefix("PM(") {
        (Space::Pm, r)
    } else {
        return None;
    };
    let inner = rest.strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let index = |t: &str| parse_indexed(t, "I", 8);
    let modify = |t: &str| parse_indexed(t, "M", 8);
    let step = |t: &str| t.strip_prefix('#').and_then(parse_int).map(|v| v as i32);
    let mode = match parts.as_slice() {
        [one] => {
            if let Some(i) = index(one) {
                AddrMode::PostImm { i, step: 0 }
            } else if let Some(a) = parse_int(one) {
                AddrMode::Direct(u32::try_from(a).ok()?)
            } else if is_identifier(one) {
                AddrMode::Symbol(one.to_string())
            } else {
                return None;
            }
        }
        [a, b] => {
            if let (Some(i), Some(m)) = (index(a), modify(b)) {
                AddrMode::Post { i, m }
            } else if let (Some(m), Some(i)) = (modify(a), index(b)) {
                AddrMode::Pre { i, m }
            } else if let (Some(i), Some(st)) = (index(a), step(b)) {
                AddrMode::PostImm { i, step: st }
            } else if let (Some(st), Some(i)) = (step(a), index(b)) {
                AddrMode::PreImm { i, step: st }
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(MemRef { space, mode })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl FromStr for Operand {
    type Err = OperandParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let raw = token.trim();
        let err = || OperandParseError(raw.to_string());
        if raw.is_empty() {
            return Err(err());
        }
        if let Some(v) = raw.strip_prefix('#') {
            return parse_int(v).map(Operand::Imm).ok_or_else(err);
        }
        let up = raw.to_ascii_uppercase();
        if let Some(m) = parse_mem(&up.replace(' ', "")) {
            // symbols keep the case they were written in
            return Ok(Operand::Mem(match m.mode {
                AddrMode::Symbol(_) => {
                    let inner = raw[3..raw.len() - 1].trim().to_string();
                    MemRef { space: m.space, mode: AddrMode::Symbol(inner) }
                }
                _ => m,
            }));
        }
        if let Some((acc, part)) = up.split_once('.') {
            if let (Some(Reg { class: RegClass::Acc, index }), Some(p)) = (
                parse_reg(acc),
                match part {
                    "H" => Some(AccPart::H),
                    "M" => Some(AccPart::M),
                    "L" => Some(AccPart::L),
                    _ => None,
                },
            ) {
                return Ok(Operand::AccPart(index, p));
            }
        }
        if let Some(r) = parse_reg(&up) {
            return Ok(Operand::Reg(r));
        }
        // indirect jump target, `(I3)`
        if let Some(r) = up
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .and_then(|s| parse_indexed(s, "I", 8))
        {
            return Ok(Operand::Reg(Reg::new(RegClass::I, r)));
        }
        if let Some(s) = parse_sys(&up) {
            return Ok(Operand::Sys(s));
        }
        if let Some(k) = parse_keyword(&up) {
            return Ok(Operand::Key(k));
        }
        if let Some(c) = Condition::from_name(&up) {
            return Ok(Operand::Cond(c));
        }
        if let Some(v) = parse_int(raw) {
            return u32::try_from(v)
                .map(|a| Operand::Target(Target::Abs(a)))
                .map_err(|_| err());
        }
        if is_identifier(raw) {
            return Ok(Operand::Target(Target::Label(raw.to_string())));
        }
        Err(err())
    }
}

/// Parses a comma separated operand list, respecting parentheses.
pub fn parse_operands(text: &str) -> Result<Vec<Operand>, OperandParseError> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(text[start..i].parse()?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !text[start..].trim().is_empty() {
        out.push(text[start..].parse()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_resolve_to_variants() {
        assert_eq!("R31".parse(), Ok(Operand::r(31)));
        assert_eq!("cr3".parse(), Ok(Operand::cr(3)));
        assert_eq!("ACC2.M".parse(), Ok(Operand::AccPart(2, AccPart::M)));
        assert_eq!("#-0x10".parse(), Ok(Operand::Imm(-16)));
        assert_eq!("CNTR".parse(), Ok(Operand::Sys(SysReg::Cntr)));
        assert_eq!("(RND)".parse(), Ok(Operand::Key(Keyword::Mul(MulMode::Rnd))));
        assert_eq!("not ce".parse(), Ok(Operand::Cond(Condition::NotCe)));
        assert_eq!("loop_end".parse(), Ok(Operand::label("loop_end")));
        assert_eq!("(I3)".parse(), Ok(Operand::Reg(Reg::new(RegClass::I, 3))));
        assert!("R32".parse::<Operand>().is_ok_and(|o| matches!(o, Operand::Target(_))));
    }

    #[test]
    fn memory_tokens() {
        let m = |s: &str| match s.parse::<Operand>() {
            Ok(Operand::Mem(m)) => m,
            other => panic!("{s}: {other:?}"),
        };
        assert_eq!(m("DM(0x1000)").mode, AddrMode::Direct(0x1000));
        assert_eq!(m("DM(I0, M1)").mode, AddrMode::Post { i: 0, m: 1 });
        assert_eq!(m("DM(M1,I0)").mode, AddrMode::Pre { i: 0, m: 1 });
        assert_eq!(m("DM(I2,#-3)").mode, AddrMode::PostImm { i: 2, step: -3 });
        assert_eq!(m("DM(#2,I4)").mode, AddrMode::PreImm { i: 4, step: 2 });
        assert_eq!(m("dm(I3)").mode, AddrMode::PostImm { i: 3, step: 0 });
        assert_eq!(m("DM(coeffs)").mode, AddrMode::Symbol("coeffs".into()));
        assert_eq!(m("PM(I0,M0)").space, Space::Pm);
    }

    #[test]
    fn operand_lists_split_outside_parens() {
        let ops = parse_operands("R3, DM(I0, M1)").unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(render(&ops), "R3, DM(I0,M1)");
    }
}

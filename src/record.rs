//! Program list: instruction records, name tables and the resolution pass.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Diagnostic, DiagnosticKind, ExecError, LineError, StructuralError};
use crate::instructions::Opcode;
use crate::isa::formats::FormatId;
use crate::isa::shape;
use crate::operand::{parse_operands, AddrMode, Condition, Keyword, Operand, Target};

/// One source operation, possibly heading a multifunction bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub line: u32,
    pub opcode: Opcode,
    #[serde(default)]
    pub program_addr: u32,
    #[serde(default)]
    pub data_addr: u32,
    /// Set once by [`Program::resolve`].
    #[serde(default)]
    pub format: Option<FormatId>,
    #[serde(default)]
    pub operands: Vec<Operand>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub conjugate: bool,
    #[serde(default)]
    pub is_delay_slot: bool,
    #[serde(default)]
    pub latency: u32,
    #[serde(default)]
    pub latency_added: u32,
    /// Co-issued siblings, owned by the head.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundle: Vec<InstructionRecord>,
    #[serde(default)]
    pub section: Option<String>,
}

impl InstructionRecord {
    pub fn new(line: u32, opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            line,
            opcode,
            program_addr: 0,
            data_addr: 0,
            format: None,
            operands,
            condition: None,
            conjugate: false,
            is_delay_slot: false,
            latency: 0,
            latency_added: 0,
            bundle: Vec::new(),
            section: None,
        }
    }

    pub fn is_pseudo(&self) -> bool {
        self.opcode.is_pseudo()
    }

    pub fn cond(&self) -> Condition {
        self.condition.unwrap_or_default()
    }

    /// The head followed by its siblings.
    pub fn members(&self) -> impl Iterator<Item = &InstructionRecord> {
        std::iter::once(self).chain(self.bundle.iter())
    }

    pub fn is_mac_word(&self) -> bool {
        self.members().any(|r| r.opcode.is_mac())
    }

    fn has_data_operand(&self) -> bool {
        self.operands.iter().any(|o| matches!(o, Operand::Mem(_)))
    }

    pub fn reads_memory(&self) -> bool {
        self.members().any(|r| r.opcode == Opcode::Ld && r.has_data_operand())
    }

    pub fn writes_memory(&self) -> bool {
        self.members().any(|r| r.opcode == Opcode::St && r.has_data_operand())
    }

    /// First token worth reporting in a diagnostic.
    pub fn token(&self) -> String {
        match self.operands.first() {
            Some(o) => o.to_string(),
            None => self.opcode.to_string(),
        }
    }

    pub fn diagnostic(&self, kind: DiagnosticKind, token: String, message: String) -> Diagnostic {
        Diagnostic {
            line: self.line,
            addr: self.program_addr,
            token,
            kind,
            message,
        }
    }

    pub fn exec_diagnostic(&self, err: &ExecError) -> Diagnostic {
        let token = match err {
            ExecError::Shape(e) => e.token(),
            ExecError::Structural(StructuralError::DuplicateDestination(t))
            | ExecError::Structural(StructuralError::MixedCondition(t))
            | ExecError::Structural(StructuralError::UnknownSymbol(t)) => t.clone(),
            _ => self.token(),
        };
        self.diagnostic(err.kind(), token, err.to_string())
    }

    fn fmt_single(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        if self.conjugate {
            f.write_str("*")?;
        }
        let mut sep = " ";
        for (i, op) in self.operands.iter().enumerate() {
            match op {
                Operand::Key(Keyword::Mul(_)) => write!(f, " {op}")?,
                Operand::Cond(c) if self.opcode == Opcode::Do && i == 1 => write!(f, " UNTIL {c}")?,
                _ => {
                    write!(f, "{sep}{op}")?;
                    sep = ", ";
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for InstructionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_pseudo() && self.cond() != Condition::True && self.opcode != Opcode::Do {
            write!(f, "IF {} ", self.cond())?;
        }
        self.fmt_single(f)?;
        for sib in &self.bundle {
            f.write_str(" || ")?;
            sib.fmt_single(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Code,
    Data,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub addr: u32,
    pub kind: SymbolKind,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    map: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    /// Returns false when the name was already defined.
    pub fn define(&mut self, name: &str, sym: Symbol) -> bool {
        if self.map.contains_key(name) {
            return false;
        }
        self.map.insert(name.to_string(), sym);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.map.get_mut(name)
    }

    pub fn addr(&self, name: &str) -> Result<u32, StructuralError> {
        self.get(name)
            .map(|s| s.addr)
            .ok_or_else(|| StructuralError::UnknownSymbol(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.map.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    Code,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub base: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionTable {
    map: BTreeMap<String, Section>,
}

impl SectionTable {
    pub fn insert(&mut self, name: &str, section: Section) {
        self.map.insert(name.to_string(), section);
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.map.get(name)
    }
}

/// Ordered program list plus the lookup tables it refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub records: Vec<InstructionRecord>,
    #[serde(default)]
    pub symbols: SymbolTable,
    #[serde(default)]
    pub sections: SectionTable,
}

impl Program {
    /// Absolute program address of a branch or loop target.
    pub fn target_addr(&self, target: &Target) -> Result<u32, StructuralError> {
        match target {
            Target::Abs(a) => Ok(*a),
            Target::Label(name) => self.symbols.addr(name),
        }
    }

    /// Absolute data address of a direct or symbolic memory operand.
    pub fn data_addr(&self, mode: &AddrMode) -> Result<Option<u32>, StructuralError> {
        match mode {
            AddrMode::Direct(a) => Ok(Some(*a)),
            AddrMode::Symbol(name) => self.symbols.addr(name).map(Some),
            _ => Ok(None),
        }
    }

    /// Index of the first instruction word at each program address.
    pub fn addr_index(&self) -> HashMap<u32, usize> {
        let mut map = HashMap::new();
        for (i, r) in self.records.iter().enumerate() {
            if !r.is_pseudo() {
                map.entry(r.program_addr).or_insert(i);
            }
        }
        map
    }

    /// Next instruction word after `idx` in program order.
    pub fn next_word(&self, idx: usize) -> Option<usize> {
        (idx + 1..self.records.len()).find(|&i| !self.records[i].is_pseudo())
    }

    fn collect_symbols(&mut self) {
        for r in &self.records {
            let name = match r.operands.first() {
                Some(Operand::Target(Target::Label(n))) => n.clone(),
                _ => continue,
            };
            let value = match r.operands.get(1) {
                Some(Operand::Target(Target::Abs(a))) => *a,
                Some(Operand::Imm(v)) => *v as u32,
                _ => r.data_addr,
            };
            match r.opcode {
                Opcode::Label => {
                    self.symbols.define(
                        &name,
                        Symbol { addr: r.program_addr, kind: SymbolKind::Code, external: false, global: false },
                    );
                }
                Opcode::Var => {
                    self.symbols.define(
                        &name,
                        Symbol { addr: value, kind: SymbolKind::Data, external: false, global: false },
                    );
                }
                Opcode::Equ => {
                    self.symbols.define(
                        &name,
                        Symbol { addr: value, kind: SymbolKind::Const, external: false, global: false },
                    );
                }
                Opcode::Extern => {
                    self.symbols.define(
                        &name,
                        Symbol { addr: 0, kind: SymbolKind::Code, external: true, global: false },
                    );
                }
                _ => {}
            }
        }
        for r in &self.records {
            if let (Opcode::Global, Some(Operand::Target(Target::Label(n)))) =
                (r.opcode, r.operands.first())
            {
                if let Some(sym) = self.symbols.get_mut(n) {
                    sym.global = true;
                }
            }
        }
    }

    /// Resolution pass: symbols, default conditions, formats and delay-slot
    /// flags. Formats already assigned are left untouched.
    pub fn resolve(&mut self, delay_slots: bool) -> Vec<Diagnostic> {
        self.collect_symbols();
        let mut diags = Vec::new();
        let mut after_branch = false;
        for r in self.records.iter_mut() {
            if r.is_pseudo() {
                continue;
            }
            let head = *r.condition.get_or_insert(Condition::True);
            for sib in r.bundle.iter_mut() {
                sib.condition.get_or_insert(head);
            }
            r.is_delay_slot = delay_slots && after_branch;
            after_branch = r.opcode.is_branch();
            if r.format.is_some() {
                continue;
            }
            if let Err(e) = shape::check_structure(r) {
                diags.push(r.exec_diagnostic(&ExecError::Structural(e)));
                continue;
            }
            match shape::select(r).map(|sel| sel.format) {
                Ok(format) => r.format = Some(format),
                Err(e) => diags.push(r.exec_diagnostic(&ExecError::Shape(e))),
            }
        }
        for d in &diags {
            tracing::warn!(line = d.line, token = %d.token, "{}", d.message);
        }
        diags
    }
}

/// Builds a program list from one-line assembly snippets.
///
/// Accepted forms: `name:` labels, `; comment`, pseudo-ops such as
/// `.VAR coeffs, 0x100`, and operations with an optional `IF <cond>`
/// prefix, a `*` mnemonic suffix for conjugation, a trailing multiply
/// mode `(SS)` and `||`-separated siblings. `DO end UNTIL CE` is accepted
/// as written.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    prog: Program,
    addr: u32,
    line: u32,
    section: Option<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(mut self, addr: u32) -> Self {
        self.addr = addr;
        self
    }

    pub fn var(&mut self, name: &str, addr: u32) -> &mut Self {
        self.line += 1;
        let mut r = InstructionRecord::new(
            self.line,
            Opcode::Var,
            vec![Operand::label(name), Operand::Target(Target::Abs(addr))],
        );
        r.data_addr = addr;
        r.program_addr = self.addr;
        self.prog.records.push(r);
        self
    }

    /// Appends a prepared record at the current address.
    pub fn push(&mut self, mut rec: InstructionRecord) -> &mut Self {
        self.line += 1;
        rec.line = self.line;
        rec.program_addr = self.addr;
        rec.section = self.section.clone();
        if !rec.is_pseudo() {
            self.addr += 1;
        }
        self.prog.records.push(rec);
        self
    }

    pub fn asm(&mut self, text: &str) -> Result<&mut Self, LineError> {
        let rec = self.parse_line(text.trim())?;
        // `.SECTION name` switches code sections, `.SECTION name, base` declares data
        if rec.opcode == Opcode::Section {
            match &rec.operands[..] {
                [Operand::Target(Target::Label(n))] => {
                    self.prog
                        .sections
                        .insert(n, Section { kind: SectionKind::Code, base: self.addr });
                    self.section = Some(n.clone());
                }
                [Operand::Target(Target::Label(n)), Operand::Target(Target::Abs(base))] => {
                    self.prog
                        .sections
                        .insert(n, Section { kind: SectionKind::Data, base: *base });
                }
                _ => {}
            }
        }
        Ok(self.push(rec))
    }

    /// Feeds several lines; stops at the first bad one.
    pub fn lines(&mut self, text: &str) -> Result<&mut Self, LineError> {
        for l in text.lines() {
            if l.trim().is_empty() {
                continue;
            }
            self.asm(l)?;
        }
        Ok(self)
    }

    fn parse_line(&self, text: &str) -> Result<InstructionRecord, LineError> {
        if text.is_empty() || text.starts_with(';') {
            return Ok(InstructionRecord::new(0, Opcode::Comment, Vec::new()));
        }
        if let Some(name) = text.strip_suffix(':') {
            return Ok(InstructionRecord::new(0, Opcode::Label, vec![Operand::label(name.trim())]));
        }
        let (cond, rest) = split_condition(text)?;
        let mut parts = rest.split("||").map(str::trim);
        let mut head = parse_op(parts.next().unwrap_or_default())?;
        head.condition = cond;
        for p in parts {
            let (cond, p) = split_condition(p)?;
            let mut sib = parse_op(p)?;
            sib.condition = cond;
            head.bundle.push(sib);
        }
        if head.opcode == Opcode::Var {
            if let Some(Operand::Target(Target::Abs(a))) = head.operands.get(1) {
                head.data_addr = *a;
            }
        }
        Ok(head)
    }

    pub fn build(self) -> Program {
        self.prog
    }
}

fn split_condition(text: &str) -> Result<(Option<Condition>, &str), LineError> {
    let Some(rest) = text
        .strip_prefix("IF ")
        .or_else(|| text.strip_prefix("if "))
    else {
        return Ok((None, text));
    };
    let rest = rest.trim_start();
    let mut words = rest.splitn(3, char::is_whitespace);
    let first = words.next().unwrap_or_default();
    let (name, skip) = if first.eq_ignore_ascii_case("NOT") {
        let second = words.next().unwrap_or_default();
        (format!("{first} {second}"), first.len() + 1 + second.len())
    } else {
        (first.to_string(), first.len())
    };
    let cond = Condition::from_name(&name)
        .ok_or_else(|| LineError::Operand(crate::error::OperandParseError(name.clone())))?;
    Ok((Some(cond), rest[skip..].trim_start()))
}

fn parse_op(text: &str) -> Result<InstructionRecord, LineError> {
    let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r.trim()),
        None => (text, ""),
    };
    let (mnemonic, conjugate) = match mnemonic.strip_suffix('*') {
        Some(m) => (m, true),
        None => (mnemonic, false),
    };
    let opcode = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| LineError::UnknownMnemonic(mnemonic.to_string()))?;
    let mut body = rest.replace(" UNTIL ", ", ").replace(" until ", ", ");
    let mut option = None;
    if let Some(pos) = body.rfind('(') {
        let tail = body[pos..].trim();
        if let Ok(op @ Operand::Key(Keyword::Mul(_))) = tail.parse::<Operand>() {
            option = Some(op);
            body = body[..pos].trim_end().trim_end_matches(',').to_string();
        }
    }
    let mut operands = parse_operands(&body)?;
    operands.extend(option);
    let mut rec = InstructionRecord::new(0, opcode, operands);
    rec.conjugate = conjugate;
    Ok(rec)
}

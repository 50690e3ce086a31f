//! Binary encoder: program list in, instruction words, listing and memory
//! image out.

use bitvec::prelude::*;
use std::fmt;
use std::str::FromStr;

use crate::error::{Diagnostic, EncodeError, StructuralError};
use crate::isa::formats::{Field, FieldKind, WORD_BITS};
use crate::isa::shape::{self, Selection};
use crate::operand::Operand;
use crate::record::{InstructionRecord, Program};

/// Word emitted in place of a record that cannot be encoded.
pub const ERROR_WORD: u32 = 0xFFFF_FFFF;

/// A field whose value depends on final addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reloc {
    pub value: i64,
    /// Index of the field's least significant bit in the word.
    pub bit_pos: u32,
    pub width: u8,
}

impl fmt::Display for Reloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{{{},{},{}}}", self.value, self.bit_pos, self.width)
    }
}

impl FromStr for Reloc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix("R{")
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(|| format!("bad relocation `{s}`"))?;
        let parts: Vec<&str> = inner.split(',').collect();
        let [v, p, w] = parts[..] else {
            return Err(format!("bad relocation `{s}`"));
        };
        let bad = |_| format!("bad relocation `{s}`");
        Ok(Reloc {
            value: v.parse().map_err(bad)?,
            bit_pos: p.parse().map_err(bad)?,
            width: w.parse().map_err(bad)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemRefKind {
    None,
    Read,
    Write,
}

impl MemRefKind {
    pub fn of(rec: &InstructionRecord) -> Self {
        if rec.writes_memory() {
            MemRefKind::Write
        } else if rec.reads_memory() {
            MemRefKind::Read
        } else {
            MemRefKind::None
        }
    }
}

impl fmt::Display for MemRefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemRefKind::None => "---",
            MemRefKind::Read => "DMR",
            MemRefKind::Write => "DMW",
        })
    }
}

impl FromStr for MemRefKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "---" => Ok(MemRefKind::None),
            "DMR" => Ok(MemRefKind::Read),
            "DMW" => Ok(MemRefKind::Write),
            _ => Err(format!("bad memory reference kind `{s}`")),
        }
    }
}

/// One listing line per emitted word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub line: u32,
    pub addr: u32,
    pub mnemonic: String,
    /// Format tag, or `ERROR` for an error word.
    pub tag: String,
    pub memref: MemRefKind,
    pub word: u32,
    pub relocs: Vec<Reloc>,
}

impl ListingLine {
    pub fn is_error(&self) -> bool {
        self.tag == "ERROR"
    }
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {:04X} {:<12} {:<12} {} {:08X}",
            self.line, self.addr, self.mnemonic, self.tag, self.memref, self.word
        )?;
        for r in &self.relocs {
            write!(f, " {r}")?;
        }
        Ok(())
    }
}

impl FromStr for ListingLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut it = s.split_whitespace();
        let mut next = |what: &str| it.next().ok_or_else(|| format!("listing line lacks {what}"));
        let line = next("line")?.parse().map_err(|e| format!("line: {e}"))?;
        let addr = u32::from_str_radix(next("address")?, 16).map_err(|e| format!("address: {e}"))?;
        let mnemonic = next("mnemonic")?.to_string();
        let tag = next("tag")?.to_string();
        let memref = next("memref")?.parse()?;
        let word = u32::from_str_radix(next("word")?, 16).map_err(|e| format!("word: {e}"))?;
        let relocs = it.map(str::parse).collect::<Result<_, _>>()?;
        Ok(ListingLine { line, addr, mnemonic, tag, memref, word, relocs })
    }
}

/// Everything one encoding pass produces.
#[derive(Debug, Clone, Default)]
pub struct Encoded {
    pub words: Vec<u32>,
    /// The words again, MSB first within each byte.
    pub bytes: Vec<u8>,
    pub listing: Vec<ListingLine>,
    /// One line of 8 hex nibbles per word.
    pub mem_image: Vec<String>,
    pub errors: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl Encoded {
    pub fn listing_text(&self) -> String {
        self.listing.iter().map(|l| format!("{l}\n")).collect()
    }

    pub fn mem_image_text(&self) -> String {
        self.mem_image.iter().map(|l| format!("{l}\n")).collect()
    }
}

/// Rolling bit buffer; flushes one listing/image line per full word.
#[derive(Debug, Default)]
pub struct Encoder {
    bits: BitVec<u8, Msb0>,
    out: Encoded,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_field(&mut self, value: u32, width: u8) {
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    fn flush(&mut self, rec: &InstructionRecord, tag: &str, relocs: Vec<Reloc>) {
        debug_assert_eq!(self.bits.len(), WORD_BITS as usize);
        let word = self.bits.iter().by_vals().fold(0u32, |acc, b| (acc << 1) | b as u32);
        self.out.bytes.extend_from_slice(self.bits.as_raw_slice());
        self.bits.clear();
        self.out.words.push(word);
        self.out.mem_image.push(format!("{word:08X}"));
        self.out.listing.push(ListingLine {
            line: rec.line,
            addr: rec.program_addr,
            mnemonic: mnemonic(rec),
            tag: tag.to_string(),
            memref: MemRefKind::of(rec),
            word,
            relocs,
        });
    }

    fn emit_error(&mut self, rec: &InstructionRecord, err: EncodeError) {
        tracing::warn!(line = rec.line, addr = rec.program_addr, "{err}");
        let token = match &err {
            EncodeError::Shape(e) => e.token(),
            EncodeError::Structural(StructuralError::UnknownSymbol(t))
            | EncodeError::Structural(StructuralError::DuplicateDestination(t))
            | EncodeError::Structural(StructuralError::MixedCondition(t)) => t.clone(),
            _ => rec.token(),
        };
        self.out.diagnostics.push(rec.diagnostic(err.kind(), token, err.to_string()));
        self.out.errors += 1;
        self.bits.clear();
        self.push_field(ERROR_WORD, 32);
        self.flush(rec, "ERROR", Vec::new());
    }

    /// Encodes one record; an error word is emitted if that fails.
    pub fn encode(&mut self, rec: &InstructionRecord, prog: &Program) {
        if rec.is_pseudo() {
            return;
        }
        match self.fields(rec, prog) {
            Ok((tag, relocs)) => self.flush(rec, tag, relocs),
            Err(e) => self.emit_error(rec, e),
        }
    }

    fn fields(
        &mut self,
        rec: &InstructionRecord,
        prog: &Program,
    ) -> Result<(&'static str, Vec<Reloc>), EncodeError> {
        // a record the resolution pass rejected reports its own shape error
        shape::check_structure(rec)?;
        let sel = shape::select(rec)?;
        if rec.format != Some(sel.format) {
            return Err(EncodeError::Unresolved { opcode: rec.opcode });
        }
        // compute everything before touching the buffer
        let layout = sel.layout();
        let mut values = Vec::with_capacity(layout.fields.len());
        let mut relocs = Vec::new();
        let mut pos = 0u32;
        for f in layout.fields {
            pos += f.width as u32;
            let v = match shape::field_value(f, &sel)? {
                Some(v) => v,
                None => {
                    let value = reloc_value(f, &sel, prog)?;
                    relocs.push(Reloc { value, bit_pos: WORD_BITS - pos, width: f.width });
                    (value as u32) & (((1u64 << f.width) - 1) as u32)
                }
            };
            tracing::trace!(tag = layout.tag, kind = ?f.kind, width = f.width, value = v);
            values.push((v, f.width));
        }
        for (v, w) in values {
            self.push_field(v, w);
        }
        Ok((layout.tag, relocs))
    }

    pub fn finish(self) -> Encoded {
        self.out
    }
}

/// Resolved value of a relocatable field, range-checked against its width.
fn reloc_value(f: &Field, sel: &Selection, prog: &Program) -> Result<i64, EncodeError> {
    let rec = sel.head;
    let addr = rec.program_addr as i64;
    let unresolved = || EncodeError::Unresolved { opcode: rec.opcode };
    let m = sel.member(f.role).ok_or_else(unresolved)?;
    let span = 1i64 << f.width;
    let (target, value, fits) = match f.kind {
        FieldKind::Addr => {
            let mref = m.mem().ok_or_else(unresolved)?;
            let a = prog.data_addr(&mref.mode)?.ok_or_else(unresolved)? as i64;
            (a, a, a < span)
        }
        FieldKind::PcRel => {
            let Some(Operand::Target(t)) = m.operand(f.arg) else {
                return Err(unresolved());
            };
            let target = prog.target_addr(t)? as i64;
            let rel = target - addr;
            (target, rel, (-span / 2..span / 2).contains(&rel))
        }
        FieldKind::LoopEnd => {
            let Some(Operand::Target(t)) = m.operand(f.arg) else {
                return Err(unresolved());
            };
            let target = prog.target_addr(t)? as i64;
            let rel = target - (addr + 1);
            (target, rel, (0..span).contains(&rel))
        }
        _ => return Err(unresolved()),
    };
    if !fits {
        return Err(EncodeError::TargetOutOfRange {
            target,
            addr: rec.program_addr,
            width: f.width,
        });
    }
    Ok(value)
}

fn mnemonic(rec: &InstructionRecord) -> String {
    rec.members()
        .map(|r| r.opcode.mnemonic())
        .collect::<Vec<_>>()
        .join("+")
}

/// Encodes every record in program order. Formats must already be
/// resolved (see [`Program::resolve`]).
pub fn encode_program(prog: &Program) -> Encoded {
    let mut enc = Encoder::new();
    for rec in &prog.records {
        enc.encode(rec, prog);
    }
    let out = enc.finish();
    tracing::debug!(words = out.words.len(), errors = out.errors, "encoded program");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_line_reads_back() {
        let l = ListingLine {
            line: 12,
            addr: 0x40,
            mnemonic: "JUMP".into(),
            tag: "BRREL".into(),
            memref: MemRefKind::None,
            word: 0x7800_001F,
            relocs: vec![Reloc { value: -3, bit_pos: 5, width: 19 }],
        };
        let text = l.to_string();
        assert!(text.contains("R{-3,5,19}"));
        assert_eq!(text.parse::<ListingLine>(), Ok(l));
    }

    #[test]
    fn memref_kinds_print_as_listed() {
        assert_eq!(MemRefKind::None.to_string(), "---");
        assert_eq!("DMW".parse(), Ok(MemRefKind::Write));
    }
}

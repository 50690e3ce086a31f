//! Error types shared by the encoder and the execution engine.

use thiserror::Error;

use crate::instructions::Opcode;

/// A front-end token that does not name any operand form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse operand `{0}`")]
pub struct OperandParseError(pub String);

/// A source line the program builder cannot turn into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error(transparent)]
    Operand(#[from] OperandParseError),
}

/// Operand combination that no format of the opcode accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("{opcode} has no form taking `{operands}`")]
    NoFormat { opcode: Opcode, operands: String },
    #[error("{opcode} requires a multiply mode option such as (SS) or (RND)")]
    MissingOption { opcode: Opcode },
    #[error("operand `{token}` does not fit a {width}-bit field")]
    OutOfRange { token: String, width: u8 },
    #[error("register `{token}` is not usable here")]
    RegisterNotAllowed { token: String },
    #[error("addressing mode `{token}` is not usable here")]
    AddressingNotAllowed { token: String },
    #[error("program memory access `{token}` is not supported")]
    ProgramMemory { token: String },
    #[error("{opcode} cannot be bundled as `{shape}`")]
    Bundle { opcode: Opcode, shape: String },
    #[error("{opcode} has no condition field")]
    Unconditional { opcode: Opcode },
}

impl ShapeError {
    /// The offending token reported next to the line number.
    pub fn token(&self) -> String {
        match self {
            ShapeError::NoFormat { operands, .. } => operands.clone(),
            ShapeError::MissingOption { opcode }
            | ShapeError::Bundle { opcode, .. }
            | ShapeError::Unconditional { opcode } => opcode.to_string(),
            ShapeError::OutOfRange { token, .. }
            | ShapeError::RegisterNotAllowed { token }
            | ShapeError::AddressingNotAllowed { token }
            | ShapeError::ProgramMemory { token } => token.clone(),
        }
    }
}

/// Faults of a single access; the access or transfer is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("data address {addr:#06x} is outside data memory")]
    OutOfRange { addr: u32 },
    #[error("complex access at odd address {addr:#06x}")]
    Unaligned { addr: u32 },
    #[error("no instruction at program address {addr:#06x}")]
    NoWord { addr: u32 },
}

/// Errors that abort only the instruction they occur in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("destination `{0}` is written twice in one bundle")]
    DuplicateDestination(String),
    #[error("bundle sibling predicated on `{0}` differs from the word's condition")]
    MixedCondition(String),
    #[error("a bundle holds at most two siblings, found {0}")]
    BundleTooLarge(usize),
    #[error("symbol `{0}` is not defined")]
    UnknownSymbol(String),
}

/// Reasons a record cannot be turned into an instruction word.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("{opcode} record has no resolved format")]
    Unresolved { opcode: Opcode },
    #[error("target {target:#x} is out of reach of a {width}-bit field at {addr:#x}")]
    TargetOutOfRange { target: i64, addr: u32, width: u8 },
}

impl EncodeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            EncodeError::Shape(ShapeError::ProgramMemory { .. }) => DiagnosticKind::Addressing,
            EncodeError::Shape(_) => DiagnosticKind::OperandShape,
            EncodeError::Structural(_) => DiagnosticKind::Structural,
            EncodeError::Unresolved { .. } | EncodeError::TargetOutOfRange { .. } => {
                DiagnosticKind::Encoding
            }
        }
    }
}

/// Reasons a record has no effect during simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl ExecError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ExecError::Shape(ShapeError::ProgramMemory { .. }) => DiagnosticKind::Addressing,
            ExecError::Shape(_) => DiagnosticKind::OperandShape,
            ExecError::Address(_) => DiagnosticKind::Addressing,
            ExecError::Structural(_) => DiagnosticKind::Structural,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Encoding,
    OperandShape,
    Addressing,
    StackDiscipline,
    Structural,
}

/// A locally recorded error: the run or the encoding pass carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message} (at `{token}`)")]
pub struct Diagnostic {
    pub line: u32,
    pub addr: u32,
    pub token: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

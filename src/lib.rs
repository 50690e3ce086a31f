pub mod control;
pub mod cpu;
pub mod disasm;
pub mod encoder;
pub mod error;
pub mod exec;
pub mod instructions;
pub mod lanes;
pub mod loader;
pub mod memory;
pub mod operand;
pub mod record;
pub mod sim;
pub mod stack;

pub mod isa {
    pub mod formats; // word layouts and fixed opcode bits
    pub mod shape;
}

pub use cpu::{Flags, MachineConfig, MachineState, Mstat};
pub use encoder::{encode_program, Encoded};
pub use error::{Diagnostic, DiagnosticKind};
pub use instructions::Opcode;
pub use memory::{DataBus, LinearMemory};
pub use record::{InstructionRecord, Program, ProgramBuilder};
pub use sim::{RunOutcome, Simulator};

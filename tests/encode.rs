use pretty_assertions::assert_eq;
use sdsp_rs::encoder::{MemRefKind, Reloc, ERROR_WORD};
use sdsp_rs::{encode_program, DiagnosticKind, Program, ProgramBuilder};

fn program(src: &str) -> Program {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    let mut p = b.build();
    p.resolve(false);
    p
}

#[test]
fn add_three_registers() {
    let enc = encode_program(&program("ADD R0, R1, R2"));
    assert_eq!(enc.words, vec![0x0000_045F]);
    assert_eq!(enc.bytes, vec![0x00, 0x00, 0x04, 0x5F]);
    assert_eq!(enc.mem_image, vec!["0000045F".to_string()]);
    assert_eq!(enc.listing[0].tag, "ALU3R");
    assert_eq!(enc.listing[0].memref, MemRefKind::None);
    assert!(enc.listing_text().contains(" --- 0000045F"));
    assert_eq!(enc.errors, 0);
}

#[test]
fn condition_occupies_low_bits() {
    let enc = encode_program(&program("IF EQ ADD R0, R1, R2"));
    assert_eq!(enc.words, vec![0x0000_0440]);
}

#[test]
fn signed_immediate_is_twos_complement() {
    let enc = encode_program(&program("ADD R3, R4, #-1"));
    assert_eq!(enc.words, vec![0x1019_3FFF]);
    assert_eq!(enc.listing[0].tag, "ALURRI");
}

#[test]
fn memory_reference_column() {
    let enc = encode_program(&program(
        "LD R2, DM(0x10)
         ST DM(I0,M1), R2
         NOP",
    ));
    let kinds: Vec<MemRefKind> = enc.listing.iter().map(|l| l.memref).collect();
    assert_eq!(kinds, vec![MemRefKind::Read, MemRefKind::Write, MemRefKind::None]);
}

#[test]
fn branch_offset_is_relative_and_relocated() {
    let enc = encode_program(&program(
        "top:
         NOP
         JUMP top",
    ));
    assert_eq!(enc.words, vec![0x7E20_0000, 0x78FF_FFFF]);
    assert_eq!(
        enc.listing[1].relocs,
        vec![Reloc { value: -1, bit_pos: 5, width: 19 }]
    );
}

#[test]
fn loop_end_counts_from_the_next_word() {
    let enc = encode_program(&program(
        "DO last UNTIL CE
         NOP
         last:
         NOP",
    ));
    assert_eq!(enc.words[0], 0x7C00_0110);
}

#[test]
fn failed_record_emits_error_word_and_continues() {
    let enc = encode_program(&program(
        "JUMP nowhere
         NOP",
    ));
    assert_eq!(enc.words, vec![ERROR_WORD, 0x7E20_0000]);
    assert_eq!(enc.errors, 1);
    assert!(enc.listing[0].is_error());
    assert_eq!(enc.listing[1].addr, 1);
    let d = &enc.diagnostics[0];
    assert_eq!((d.line, d.kind), (1, DiagnosticKind::Structural));
    assert_eq!(d.token, "nowhere");
}

#[test]
fn oversized_immediate_is_an_operand_error() {
    let enc = encode_program(&program("ADD R0, R1, #1000"));
    assert_eq!(enc.words, vec![ERROR_WORD]);
    let d = &enc.diagnostics[0];
    assert_eq!((d.kind, d.token.as_str()), (DiagnosticKind::OperandShape, "#1000"));
}

#[test]
fn unresolved_record_is_an_encoding_error() {
    let mut b = ProgramBuilder::new();
    b.lines("ADD R0, R1, R2").unwrap();
    let enc = encode_program(&b.build());
    assert_eq!(enc.words, vec![ERROR_WORD]);
    assert_eq!(enc.diagnostics[0].kind, DiagnosticKind::Encoding);
}

#[test]
fn pseudo_records_emit_nothing() {
    let enc = encode_program(&program(
        "; comment
         .VAR coeffs, 0x100
         start:
         LD R1, DM(coeffs)",
    ));
    assert_eq!(enc.words.len(), 1);
    assert_eq!(enc.listing[0].relocs[0].value, 0x100);
}

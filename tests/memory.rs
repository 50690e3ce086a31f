use pretty_assertions::assert_eq;
use sdsp_rs::isa::formats::FormatId;
use sdsp_rs::lanes::LaneMask;
use sdsp_rs::operand::{Operand, Reg, RegClass};
use sdsp_rs::{DataBus, DiagnosticKind, InstructionRecord, MachineConfig, Opcode, ProgramBuilder, Simulator};

fn sim_with(src: &str, cfg: MachineConfig) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    Simulator::new(b.build(), cfg)
}

fn sim(src: &str) -> Simulator {
    sim_with(src, MachineConfig::default())
}

#[test]
fn post_modify_stores_then_pre_modify_loads() {
    let mut s = sim(
        "LD I0, #0x10
         LD M1, #1
         ST DM(I0,M1), R1
         ST DM(I0,M1), R2
         LD I3, #0x10
         LD R4, DM(M1,I3)
         LD R5, DM(I3,#-1)
         LD R6, DM(I3)",
    );
    s.state.r[1] = [1, 2, 3, 4];
    s.state.r[2] = [-5, -6, -7, -8];
    s.run();
    assert_eq!(s.mem.read(0x10), Ok([1, 2, 3, 4]));
    assert_eq!(s.mem.read(0x11), Ok([-5, -6, -7, -8]));
    assert_eq!(s.state.i[0], 0x12);
    // pre-modify updates I3 to 0x11 before the access
    assert_eq!(s.state.r[4], [-5, -6, -7, -8]);
    assert_eq!(s.state.r[5], [-5, -6, -7, -8]);
    assert_eq!(s.state.r[6], [1, 2, 3, 4]);
    assert_eq!(s.state.i[3], 0x10);
}

#[test]
fn circular_buffer_wraps_at_length() {
    let mut s = sim(
        "LD B1, #0x20
         LD I1, #0x20
         LD L1, #3
         LD M2, #1
         LD CNTR, #5
         DO last UNTIL CE
         last:
         ST DM(I1,M2), R1",
    );
    s.state.r[1] = [7; 4];
    s.run();
    assert_eq!(s.state.i[1], 0x22);
    for a in 0x20..0x23 {
        assert_eq!(s.mem.read(a), Ok([7; 4]));
    }
    assert_eq!(s.mem.read(0x23), Ok([0; 4]));
}

#[test]
fn modify_steps_without_access() {
    let mut s = sim(
        "LD I2, #0x100
         LD M3, #-4
         MODIFY I2, M3
         MOV R1, I2
         MOV M5, R2",
    );
    s.state.r[2] = [-7, 1, 1, 1];
    s.run();
    assert_eq!(s.state.i[2], 0xFC);
    assert_eq!(s.state.r[1], [0xFC; 4]);
    assert_eq!(s.state.m[5], -7);
}

#[test]
fn complex_pair_occupies_two_words() {
    let mut s = sim(
        "ST DM(0x40), CR1
         LD CR2, DM(0x40)
         ST DM(0x43), CR1",
    );
    s.state.r[2] = [5, 0, -1, 2047];
    s.state.r[3] = [-6, 1, -1, -2048];
    s.run();
    assert_eq!(s.mem.read(0x40), Ok([5, 0, -1, 2047]));
    assert_eq!(s.mem.read(0x41), Ok([-6, 1, -1, -2048]));
    assert_eq!(s.state.r[4], s.state.r[2]);
    assert_eq!(s.state.r[5], s.state.r[3]);
    assert_eq!(s.mem.read(0x43), Ok([0; 4]));
    assert_eq!(s.diagnostics.len(), 1);
    assert_eq!(s.diagnostics[0].kind, DiagnosticKind::Addressing);
    assert_eq!(s.diagnostics[0].line, 3);
}

#[test]
fn faulting_access_is_skipped_but_index_moves() {
    let cfg = MachineConfig { data_words: 0x20, ..MachineConfig::default() };
    let mut s = sim_with(
        "LD I0, #0x1F
         LD M0, #4
         LD R1, DM(I0,M0)
         LD R2, DM(I0,M0)
         ADD R3, R3, #1",
        cfg,
    );
    s.mem.write(0x1F, [9; 4], LaneMask::ALL).unwrap();
    s.state.r[2] = [42; 4];
    s.run();
    assert_eq!(s.state.r[1], [9; 4]);
    assert_eq!(s.state.r[2], [42; 4]);
    assert_eq!(s.state.i[0], 0x27);
    assert_eq!(s.state.r[3], [1; 4]);
    let kinds: Vec<(u32, DiagnosticKind)> = s.diagnostics.iter().map(|d| (d.line, d.kind)).collect();
    assert_eq!(kinds, vec![(4, DiagnosticKind::Addressing)]);
}

#[test]
fn bit_reversed_addressing_on_low_index_registers() {
    let mut s = sim(
        "ENA BR
         LD I0, #1
         LD I4, #1
         LD R1, DM(I0)
         LD R2, DM(I4)",
    );
    s.mem.write(0x8000, [3; 4], LaneMask::ALL).unwrap();
    s.mem.write(1, [4; 4], LaneMask::ALL).unwrap();
    s.run();
    assert_eq!(s.state.r[1], [3; 4]);
    assert_eq!(s.state.r[2], [4; 4]);
}

#[test]
fn masked_store_leaves_inactive_lanes() {
    let mut s = sim(
        "CMP R1, #0
         IF GT ST DM(0x5), R2",
    );
    s.mem.write(5, [-1; 4], LaneMask::ALL).unwrap();
    s.state.r[1] = [1, 0, 2, -3];
    s.state.r[2] = [8; 4];
    s.run();
    assert_eq!(s.mem.read(5), Ok([8, -1, 8, -1]));
}

#[test]
fn symbols_resolve_to_data_addresses() {
    let mut s = sim(
        ".VAR coeffs, 0x30
         LD R1, DM(coeffs)",
    );
    s.mem.write(0x30, [11; 4], LaneMask::ALL).unwrap();
    s.run();
    assert_eq!(s.state.r[1], [11; 4]);
}

#[test]
fn register_past_the_dag_file_is_rejected() {
    let load = || {
        InstructionRecord::new(0, Opcode::Ld, vec![Operand::Reg(Reg::new(RegClass::I, 9)), Operand::imm(5)])
    };
    // a record arriving with a format already assigned is still checked at run time
    let mut preset = load();
    preset.format = Some(FormatId::LdiDag);
    for rec in [load(), preset] {
        let mut b = ProgramBuilder::new();
        b.push(rec);
        b.lines("ADD R0, R0, #1").unwrap();
        let mut s = Simulator::new(b.build(), MachineConfig::default());
        s.run();
        assert_eq!(s.state.i, [0; 8]);
        assert_eq!(s.state.m, [0; 8]);
        assert_eq!(s.state.r[0], [1; 4]);
        assert!(!s.diagnostics.is_empty());
        assert!(s.diagnostics.iter().all(|d| d.kind == DiagnosticKind::OperandShape && d.token == "I9"));
    }
}

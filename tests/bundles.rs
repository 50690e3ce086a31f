use pretty_assertions::assert_eq;
use sdsp_rs::lanes::LaneMask;
use sdsp_rs::{DataBus, DiagnosticKind, MachineConfig, ProgramBuilder, Simulator};

fn sim(src: &str) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    Simulator::new(b.build(), MachineConfig::default())
}

#[test]
fn siblings_read_the_state_before_the_word() {
    let mut s = sim("ADD R0, R1, R2 || LD R1, DM(I0,M1)");
    s.state.m[1] = 1;
    s.state.r[1] = [1; 4];
    s.state.r[2] = [2; 4];
    s.mem.write(0, [50; 4], LaneMask::ALL).unwrap();
    s.run();
    assert_eq!(s.state.r[0], [3; 4]);
    assert_eq!(s.state.r[1], [50; 4]);
    assert_eq!(s.state.i[0], 1);
    assert!(s.diagnostics.is_empty());
}

#[test]
fn store_sibling_sees_the_old_destination() {
    let mut s = sim("ADD R0, R1, R2 || ST DM(I1,M1), R0");
    s.state.i[1] = 8;
    s.state.r[0] = [-9; 4];
    s.state.r[1] = [4; 4];
    s.run();
    assert_eq!(s.mem.read(8), Ok([-9; 4]));
    assert_eq!(s.state.r[0], [4; 4]);
}

#[test]
fn multiply_with_two_loads() {
    let mut s = sim("MAC ACC0, R2, R3 (SS) || LD R1, DM(I0,M0) || LD R5, DM(I4,M4)");
    s.state.i[4] = 3;
    s.state.r[2] = [2; 4];
    s.state.r[3] = [-3; 4];
    s.state.acc[0] = [10; 4];
    s.mem.write(0, [7; 4], LaneMask::ALL).unwrap();
    s.mem.write(3, [8; 4], LaneMask::ALL).unwrap();
    s.run();
    assert_eq!(s.state.acc[0], [4; 4]);
    assert_eq!(s.state.r[1], [7; 4]);
    assert_eq!(s.state.r[5], [8; 4]);
    assert!(s.diagnostics.is_empty());
}

#[test]
fn condition_masks_every_sibling() {
    let mut s = sim(
        "CMP R6, #0
         IF EQ ADD R0, R1, R2 || LD R3, DM(I0,M0)",
    );
    s.state.r[6] = [0, 1, 0, 1];
    s.state.r[1] = [1; 4];
    s.mem.write(0, [5; 4], LaneMask::ALL).unwrap();
    s.run();
    assert_eq!(s.state.r[0], [1, 0, 1, 0]);
    assert_eq!(s.state.r[3], [5, 0, 5, 0]);
}

#[test]
fn duplicate_destination_has_no_effect() {
    let mut s = sim("ADD R0, R1, R2 || LD R0, DM(I0,M1)");
    s.state.r[1] = [1; 4];
    s.state.m[1] = 1;
    s.run();
    assert_eq!(s.state.r[0], [0; 4]);
    assert_eq!(s.state.i[0], 0);
    assert!(!s.diagnostics.is_empty());
    assert!(s.diagnostics.iter().all(|d| d.kind == DiagnosticKind::Structural));
    assert_eq!(s.diagnostics[0].token, "R0");
}

#[test]
fn unpairable_operations_are_rejected() {
    for src in [
        "NEG R0, R1 || LD R2, DM(I0,M1)",
        "ADD R0, R1, R2 || LD R3, DM(0x10)",
        "ADD R0, R1, R2 || SUB R3, R4, R5",
    ] {
        let s = sim(src);
        assert_eq!(s.diagnostics.len(), 1, "{src}");
        assert_eq!(s.diagnostics[0].kind, DiagnosticKind::OperandShape, "{src}");
    }
}

#[test]
fn three_siblings_is_too_many() {
    let s = sim("MAC ACC0, R2, R3 (SS) || LD R1, DM(I0,M0) || LD R5, DM(I4,M4) || ST DM(I1,M1), R6");
    assert_eq!(s.diagnostics.len(), 1);
    assert_eq!(s.diagnostics[0].kind, DiagnosticKind::Structural);
}

#[test]
fn siblings_share_the_word_condition() {
    let s = sim("ADD R0, R1, R2 || IF EQ LD R1, DM(I0,M1)");
    assert_eq!(s.diagnostics.len(), 1);
    let d = &s.diagnostics[0];
    assert_eq!((d.kind, d.token.as_str()), (DiagnosticKind::Structural, "EQ"));

    let mut s = sim(
        "CMP R2, #0
         IF EQ ADD R0, R1, R2 || IF EQ LD R3, DM(I0,M1)",
    );
    s.state.r[1] = [6; 4];
    s.run();
    assert!(s.diagnostics.is_empty());
    assert_eq!(s.state.r[0], [6; 4]);
}

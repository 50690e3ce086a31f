use pretty_assertions::assert_eq;
use sdsp_rs::{Flags, MachineConfig, ProgramBuilder, Simulator};

fn sim(src: &str) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    Simulator::new(b.build(), MachineConfig::default())
}

#[test]
fn multiply_accumulate_subtract() {
    let mut s = sim(
        "MPY ACC0, R1, R2 (SS)
         MAC ACC1, R1, R2 (SS)
         MAC ACC1, R1, R2 (SS)
         MAS ACC0, R1, R1 (SS)",
    );
    s.state.r[1] = [3, -3, 100, 2047];
    s.state.r[2] = [4, 4, 100, 2047];
    s.run();
    assert_eq!(s.state.acc[1], [24, -24, 20000, 8_380_418]);
    assert_eq!(s.state.acc[0], [3, -21, 0, 0]);
    let mn: Vec<bool> = s.state.flags.iter().map(|f| f.re.contains(Flags::MN)).collect();
    assert_eq!(mn, vec![false, true, false, false]);
}

#[test]
fn unsigned_operand_modes() {
    let mut s = sim(
        "MPY ACC0, R1, R2 (SU)
         MPY ACC1, R1, R2 (UU)",
    );
    s.state.r[1] = [2, -1, 0, 1];
    s.state.r[2] = [-1, -1, 0, 1];
    s.run();
    assert_eq!(s.state.acc[0], [8190, -4095, 0, 1]);
    assert_eq!(s.state.acc[1], [8190, 16_769_025, 0, 1]);
}

#[test]
fn accumulator_overflow_and_saturation() {
    let mut s = sim(
        "MPY ACC0, R1, R1 (SS)
         MAC ACC0, R1, R1 (SS)
         MAC ACC0, R1, R1 (SS)
         ENA MS
         MPY ACC1, R1, R1 (SS)
         MAC ACC1, R1, R1 (SS)
         MAC ACC1, R1, R1 (SS)",
    );
    s.state.r[1] = [2047, -2048, 1, 0];
    s.run();
    assert_eq!(s.state.acc[0][0], 3 * 2047 * 2047);
    assert_eq!(s.state.acc[1], [0x7F_FFFF, 0x7F_FFFF, 3, 0]);
    let f = s.state.flags[0].re;
    assert!(f.contains(Flags::MV | Flags::MVS));
    assert!(!s.state.flags[2].re.contains(Flags::MVS));
}

#[test]
fn rounding_mode_clears_the_low_word() {
    let mut s = sim(
        "MPY ACC0, R1, R2 (RND)
         MPY ACC1, R1, R2 (SS)
         RND ACC1
         CLR ACC2",
    );
    s.state.r[1] = [64, 63, 1, -64];
    s.state.r[2] = [48, 32, 1, 48];
    s.state.acc[2] = [9; 4];
    s.run();
    assert_eq!(s.state.acc[0], [4096, 0, 0, -4096]);
    assert_eq!(s.state.acc[1], s.state.acc[0]);
    assert_eq!(s.state.acc[2], [0; 4]);
}

#[test]
fn accumulator_views_alias() {
    let mut s = sim(
        "MOV ACC1.L, R1
         MOV ACC1.M, R2
         MOV ACC1.H, R3
         MOV R6, ACC1.M
         SAT ACC1",
    );
    s.state.r[1] = [0x678; 4];
    s.state.r[2] = [0x345; 4];
    s.state.r[3] = [0x12; 4];
    s.run();
    assert_eq!(s.state.r[6], [0x345; 4]);
    assert_eq!(s.state.acc[1], [0x7F_FFFF; 4]);
}

#[test]
fn complex_products_fill_an_accumulator_pair() {
    let mut s = sim(
        "MPY ACC2, CR1, CR2 (SS)
         MPY* ACC4, CR1, CR2 (SS)",
    );
    // CR1 = 3 + 4j, CR2 = 1 + 2j
    s.state.r[2] = [3; 4];
    s.state.r[3] = [4; 4];
    s.state.r[4] = [1; 4];
    s.state.r[5] = [2; 4];
    s.run();
    assert_eq!((s.state.acc[2][0], s.state.acc[3][0]), (-5, 10));
    assert_eq!((s.state.acc[4][0], s.state.acc[5][0]), (11, -2));
    // flags of the conjugate product: 11 - 2j
    let fb = s.state.flags[0];
    assert_eq!(fb.re & Flags::MAC, Flags::empty());
    assert_eq!(fb.im & Flags::MAC, Flags::MN);
    assert_eq!(fb.cplx & Flags::MAC, Flags::empty());
}

#[test]
fn complex_alu_updates_three_banks() {
    let mut s = sim(
        "ADD CR0, CR1, CR2
         SUB* CR3, CR1, CR2
         CONJ CR4, CR1",
    );
    s.state.r[2] = [3, 0, 0, 0];
    s.state.r[3] = [4, 0, 0, 0];
    s.state.r[4] = [-3, 0, 0, 0];
    s.state.r[5] = [1, 0, 0, 0];
    s.run();
    assert_eq!((s.state.r[0][0], s.state.r[1][0]), (0, 5));
    assert_eq!((s.state.r[6][0], s.state.r[7][0]), (6, 5));
    assert_eq!((s.state.r[8][0], s.state.r[9][0]), (3, -4));
    // lane 1 stays zero in both halves
    let zero = |l: usize| s.state.flags[l].cplx.contains(Flags::AZ);
    assert!(!zero(0));
    assert!(zero(1));
}

#[test]
fn polar_conversion_per_lane() {
    let mut s = sim("POLAR CR0, CR1");
    s.state.r[2] = [1000, 0, 0, -1000];
    s.state.r[3] = [0, 1000, -1000, 0];
    s.run();
    assert_eq!(s.state.r[0], [1001, 1000, 1001, 1001]);
    assert_eq!(s.state.r[1], [0, 1024, -1024, -2048]);
}

#[test]
fn rect_conversion_per_lane() {
    let mut s = sim("RECT CR0, CR1");
    s.state.r[2] = [1000; 4];
    s.state.r[3] = [0, 1024, -1024, 2047];
    s.run();
    assert_eq!(s.state.r[0], [999, -3, 0, -1001]);
    assert_eq!(s.state.r[1], [3, 1001, -1001, 0]);
}

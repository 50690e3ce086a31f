use pretty_assertions::assert_eq;
use sdsp_rs::{Flags, MachineConfig, ProgramBuilder, RunOutcome, Simulator};

fn sim(src: &str) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    Simulator::new(b.build(), MachineConfig::default())
}

fn re_flags(s: &Simulator) -> [Flags; 4] {
    s.state.flags.map(|f| f.re)
}

#[test]
fn add_wraps_per_lane_and_flags_each_lane() {
    let mut s = sim("ADD R0, R1, R2");
    s.state.r[1] = [1, 2047, -2048, 5];
    s.state.r[2] = [1, 1, -1, -5];
    assert_eq!(s.run(), RunOutcome::Finished);
    assert_eq!(s.state.r[0], [2, -2048, 2047, 0]);
    assert_eq!(
        re_flags(&s),
        [
            Flags::empty(),
            Flags::AV | Flags::AN | Flags::AVS,
            Flags::AV | Flags::AC | Flags::AS | Flags::AVS,
            Flags::AZ | Flags::AC,
        ]
    );
}

#[test]
fn alu_saturation_mode_clamps() {
    let mut s = sim(
        "ENA AS
         ADD R0, R1, R2
         DIS AS
         ADD R3, R1, R2",
    );
    s.state.r[1] = [2047, -2048, 100, 0];
    s.state.r[2] = [1, -1, 1, 0];
    s.run();
    assert_eq!(s.state.r[0], [2047, -2048, 101, 0]);
    assert_eq!(s.state.r[3], [-2048, 2047, 101, 0]);
    assert!(s.state.mstat.is_empty());
}

#[test]
fn compare_then_conditional_update_is_per_lane() {
    let mut s = sim(
        "CMP R1, R2
         IF LT ADD R3, R3, #1",
    );
    s.state.r[1] = [1, 5, 3, -4];
    s.state.r[2] = [2, 5, 1, 0];
    s.run();
    assert_eq!(s.state.r[3], [1, 0, 0, 1]);
    assert_eq!(s.state.r[1], [1, 5, 3, -4]);
}

#[test]
fn carry_chains_through_adc() {
    let mut s = sim(
        "ADD R0, R1, R2
         ADC R4, R5, R6",
    );
    s.state.r[1] = [-1, 1, 0, 0];
    s.state.r[2] = [1, 1, 0, 0];
    s.state.r[5] = [10; 4];
    s.run();
    assert_eq!(s.state.r[4], [11, 10, 10, 10]);
}

#[test]
fn unary_operations() {
    let mut s = sim(
        "NEG R0, R1
         ABS R2, R1
         NOT R3, R1
         INC R4, R1
         EXP R5, R1",
    );
    s.state.r[1] = [5, -5, 0, -2048];
    s.run();
    assert_eq!(s.state.r[0], [-5, 5, 0, -2048]);
    assert_eq!(s.state.r[2], [5, 5, 0, -2048]);
    assert_eq!(s.state.r[3], [-6, 4, -1, 2047]);
    assert_eq!(s.state.r[4], [6, -4, 1, -2047]);
    assert_eq!(s.state.r[5], [8, 8, 11, 0]);
    assert!(s.state.flags[3].re.contains(Flags::AS));
}

#[test]
fn bit_operations() {
    let mut s = sim(
        "SETB R0, R1, #3
         CLRB R2, R1, #0
         TGLB R3, R1, #11
         TSTB R1, #1",
    );
    s.state.r[1] = [1, 2, 3, 0];
    s.run();
    assert_eq!(s.state.r[0], [9, 10, 11, 8]);
    assert_eq!(s.state.r[2], [0, 2, 2, 0]);
    assert_eq!(s.state.r[3], [-2047, -2046, -2045, -2048]);
    let zero: Vec<bool> = re_flags(&s).iter().map(|f| f.contains(Flags::AZ)).collect();
    assert_eq!(zero, vec![true, false, false, true]);
}

#[test]
fn division_steps_produce_the_quotient() {
    let mut src = String::from("DIVS R0, R2\n");
    for _ in 0..11 {
        src.push_str("DIVQ R0, R2\n");
    }
    let mut s = sim(&src);
    s.state.r[0] = [0, 0, 1, 0];
    s.state.r[1] = [100, 1000, 0, 100];
    s.state.r[2] = [7, 10, 100, 7];
    s.run();
    assert_eq!(s.state.r[1], [14, 100, 40, 14]);
}

#[test]
fn shifts_set_shifter_flags() {
    let mut s = sim(
        "LSL R0, R1, #4
         ASR R2, R1, #4
         LSR R3, R1, #4
         ROL R4, R1, #4",
    );
    s.state.r[1] = [1, 0x100, -16, 0];
    s.run();
    assert_eq!(s.state.r[0], [16, 0, -256, 0]);
    assert_eq!(s.state.r[2], [0, 16, -1, 0]);
    assert_eq!(s.state.r[3], [0, 16, 255, 0]);
    assert_eq!(s.state.r[4], [16, 1, -241, 0]);
}

#[test]
fn shift_overflow_is_sticky() {
    let mut s = sim(
        "LSL R0, R1, #4
         LSL R2, R3, #1",
    );
    s.state.r[1] = [0x100; 4];
    s.state.r[3] = [1; 4];
    s.run();
    let f = s.state.flags[0].re;
    assert!(f.contains(Flags::SVS));
    assert!(!f.contains(Flags::SV));
    assert!(!f.contains(Flags::SZ));
}

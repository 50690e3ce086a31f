use pretty_assertions::assert_eq;
use sdsp_rs::{MachineConfig, ProgramBuilder, Simulator};

const SRC: &str = "CMP R1, R2
                   IF GE SUB R3, R1, R2
                   IF LT SUB R3, R2, R1
                   MPY ACC0, R3, R1 (SS)
                   MOV R4, ACC0.L
                   LSL R5, R3, #3
                   ADD R6, R5, R4";

fn run(r1: [i16; 4], r2: [i16; 4]) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(SRC).unwrap();
    let mut s = Simulator::new(b.build(), MachineConfig::default());
    s.state.r[1] = r1.map(i32::from);
    s.state.r[2] = r2.map(i32::from);
    s.run();
    s
}

#[test]
fn each_lane_matches_a_broadcast_run() {
    let r1 = [100, -7, 2047, 0];
    let r2 = [3, 40, -2048, 0];
    let mixed = run(r1, r2);
    for lane in 0..4 {
        let alone = run([r1[lane]; 4], [r2[lane]; 4]);
        for reg in 3..=6 {
            assert_eq!(mixed.state.r[reg][lane], alone.state.r[reg][0], "R{reg} lane {lane}");
        }
        assert_eq!(mixed.state.acc[0][lane], alone.state.acc[0][0]);
        assert_eq!(mixed.state.flags[lane], alone.state.flags[0]);
    }
}

#[test]
fn absolute_difference_per_lane() {
    let s = run([100, -7, 5, 0], [3, 40, 5, 0]);
    assert_eq!(s.state.r[3], [97, 47, 0, 0]);
}

use pretty_assertions::assert_eq;
use sdsp_rs::lanes::LaneMask;
use sdsp_rs::sim::Command;
use sdsp_rs::{DataBus, MachineConfig, ProgramBuilder, Simulator};

const SRC: &str = "ADD R0, R0, #1
                   ADD R0, R0, #1
                   ST DM(0x0), R0
                   ADD R0, R0, #1";

fn sim() -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(SRC).unwrap();
    Simulator::new(b.build(), MachineConfig::default())
}

fn send(s: &mut Simulator, line: &str) -> (bool, String) {
    let mut out = String::new();
    let cmd: Command = line.parse().unwrap();
    let go_on = s.command(cmd, &mut out);
    (go_on, out)
}

#[test]
fn step_reports_the_next_word() {
    let mut s = sim();
    let (_, out) = send(&mut s, "s");
    assert!(out.starts_with("0001 ADD"), "{out}");
    assert_eq!(s.state.r[0], [1; 4]);
}

#[test]
fn break_continue_and_delete() {
    let mut s = sim();
    send(&mut s, "b 2");
    let (_, out) = send(&mut s, "c");
    assert_eq!(out, "Breakpoint(2) after 2 steps\n");
    send(&mut s, "d 0x2");
    assert!(s.breakpoints.is_empty());
    let (_, out) = send(&mut s, "c");
    assert_eq!(out, "Finished after 4 steps\n");
    let (_, out) = send(&mut s, "s");
    assert_eq!(out, "finished\n");
}

#[test]
fn dump_prints_sixteen_rows() {
    let mut s = sim();
    s.run();
    s.mem.write(1, [1, 2, 3, 4], LaneMask::ALL).unwrap();
    let (_, out) = send(&mut s, "m 0");
    let rows: Vec<&str> = out.lines().collect();
    assert_eq!(rows.len(), 16);
    assert_eq!(rows[0], "0000:     2     2     2     2      1     2     3     4");
    assert!(rows[15].starts_with("001E: "));
}

#[test]
fn dump_past_the_end_marks_missing_words() {
    let cfg = MachineConfig { data_words: 0x20, ..MachineConfig::default() };
    let s = Simulator::new(ProgramBuilder::new().build(), cfg);
    let grid = s.dump_grid(0x10);
    let last = grid.lines().last().unwrap();
    assert_eq!(last, "002E:     -     -     -     -      -     -     -     -");
}

#[test]
fn quit_ends_the_session() {
    let mut s = sim();
    assert_eq!(send(&mut s, "q"), (false, String::new()));
    assert!(" ".parse::<Command>().is_err());
}

#[test]
fn reruns_are_deterministic() {
    let src = "LD CNTR, #4
               LD M1, #1
               DO last UNTIL CE
               MAC ACC0, R1, R2 (SS)
               last:
               ST DM(I0,M1), R1";
    let run = || {
        let mut b = ProgramBuilder::new();
        b.lines(src).unwrap();
        let mut s = Simulator::new(b.build(), MachineConfig::default());
        s.state.r[1] = [3, -2, 7, 0];
        s.state.r[2] = [5; 4];
        s.run();
        s
    };
    let (a, b) = (run(), run());
    assert_eq!(a.state, b.state);
    assert_eq!(a.mem, b.mem);
    assert_eq!(a.cycles(), b.cycles());
    assert_eq!(a.diagnostics, b.diagnostics);
    assert_eq!(a.state.acc[0], [60, -40, 140, 0]);
}

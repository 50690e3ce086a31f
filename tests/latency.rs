use pretty_assertions::assert_eq;
use sdsp_rs::{MachineConfig, ProgramBuilder, Simulator};

fn run_with(src: &str, cfg: MachineConfig) -> Simulator {
    let mut b = ProgramBuilder::new();
    b.lines(src).unwrap();
    let mut s = Simulator::new(b.build(), cfg);
    s.run();
    s
}

fn run(src: &str) -> Simulator {
    run_with(src, MachineConfig::default())
}

/// (latency, latency_added) of the word at `addr` after its last execution.
fn latency_at(s: &Simulator, addr: u32) -> (u32, u32) {
    let r = s
        .prog
        .records
        .iter()
        .find(|r| !r.is_pseudo() && r.program_addr == addr)
        .unwrap();
    (r.latency, r.latency_added)
}

#[test]
fn load_after_store_stalls_once() {
    let s = run(
        "ST DM(0x10), R1
         LD R2, DM(0x10)
         LD R3, DM(0x10)",
    );
    assert_eq!(latency_at(&s, 0), (1, 0));
    assert_eq!(latency_at(&s, 1), (2, 1));
    assert_eq!(latency_at(&s, 2), (1, 0));
    assert_eq!(s.cycles(), 4);
}

#[test]
fn mac_streak_pays_on_exit() {
    let s = run(
        "MAC ACC0, R1, R2 (SS)
         MAC ACC0, R1, R2 (SS)
         NOP",
    );
    assert_eq!(latency_at(&s, 0), (1, 0));
    assert_eq!(latency_at(&s, 1), (2, 1));
    assert_eq!(s.cycles(), 4);
}

#[test]
fn mac_at_program_end_still_pays() {
    let s = run("MPY ACC0, R1, R2 (SS)");
    assert_eq!(latency_at(&s, 0), (2, 1));
    assert_eq!(s.cycles(), 2);
}

#[test]
fn mac_loop_body_only_pays_on_the_last_pass() {
    let s = run(
        "LD CNTR, #3
         DO last UNTIL CE
         last:
         MAC ACC0, R1, R2 (SS)
         NOP",
    );
    assert_eq!(latency_at(&s, 2), (2, 1));
    assert_eq!(s.cycles(), 7);
    assert_eq!(s.steps, 6);
}

#[test]
fn plain_words_take_one_cycle() {
    let s = run(
        "ADD R0, R1, R2
         SUB R3, R0, #1
         NOP",
    );
    assert_eq!(s.cycles(), 3);
    assert!(s.prog.records.iter().all(|r| r.latency_added == 0));
}

#[test]
fn stall_follows_the_executed_word_not_program_order() {
    // the store before the load is jumped over
    let s = run(
        "ST DM(0x10), R1
         JUMP x
         ST DM(0x11), R1
         x:
         LD R2, DM(0x10)",
    );
    assert_eq!(latency_at(&s, 3), (1, 0));
    assert_eq!(s.cycles(), 3);

    // the store in the delay slot runs right before the branch target
    let cfg = MachineConfig { delay_slots: true, ..MachineConfig::default() };
    let s = run_with(
        "JUMP x
         ST DM(0x10), R1
         NOP
         x:
         LD R2, DM(0x10)",
        cfg,
    );
    assert_eq!(latency_at(&s, 3), (2, 1));
    assert_eq!(s.cycles(), 4);
}

#[test]
fn predicated_store_still_occupies_the_write_slot() {
    let s = run(
        "IF EQ ST DM(0x10), R1
         LD R2, DM(0x10)",
    );
    assert_eq!(latency_at(&s, 1), (2, 1));
}

#[test]
fn loop_wrap_feeds_the_load() {
    let s = run(
        "LD CNTR, #3
         DO last UNTIL CE
         LD R2, DM(0x10)
         last:
         ST DM(0x10), R1",
    );
    // the first pass follows the DO word, the others follow the store
    assert_eq!(latency_at(&s, 2), (2, 1));
    assert_eq!(s.steps, 8);
    assert_eq!(s.cycles(), 10);
}

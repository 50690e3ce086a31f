use serde::{Deserialize, Serialize};

use crate::cpu::{Flags, Mstat};
use crate::lanes::LANES;

/// Fixed-depth stack that refuses to overflow or underflow.
///
/// A rejected push or pop leaves the contents unchanged and raises a sticky
/// flag; nothing else consults the flags, they are there for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedStack<T> {
    items: Vec<T>,
    depth: usize,
    pub overflow: bool,
    pub underflow: bool,
}

impl<T: Clone> BoundedStack<T> {
    pub fn new(depth: usize) -> Self {
        Self {
            items: Vec::with_capacity(depth),
            depth,
            overflow: false,
            underflow: false,
        }
    }

    /// Returns false (and sets `overflow`) when the stack is full.
    pub fn push(&mut self, v: T) -> bool {
        if self.items.len() >= self.depth {
            self.overflow = true;
            return false;
        }
        self.items.push(v);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        let v = self.items.pop();
        if v.is_none() {
            self.underflow = true;
        }
        v
    }

    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Entries from the bottom up.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// One zero-overhead loop as kept across the four parallel loop stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    pub begin: u32,
    pub end: u32,
    /// Remaining iterations; 0 stands for 0x10000.
    pub count: u16,
    pub forever: bool,
}

/// Saved status for PUSH/POP STS: the three flag banks plus MSTAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame {
    pub re: [Flags; LANES],
    pub im: [Flags; LANES],
    pub cplx: [Flags; LANES],
    pub mode: Mstat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stacks {
    pub pc: BoundedStack<u32>,
    pub loop_begin: BoundedStack<u32>,
    pub loop_end: BoundedStack<u32>,
    pub loop_count: BoundedStack<u16>,
    pub loop_forever: BoundedStack<bool>,
    pub sts_re: BoundedStack<[Flags; LANES]>,
    pub sts_im: BoundedStack<[Flags; LANES]>,
    pub sts_cplx: BoundedStack<[Flags; LANES]>,
    pub sts_mode: BoundedStack<Mstat>,
}

impl Stacks {
    pub fn new(depth: usize) -> Self {
        Self {
            pc: BoundedStack::new(depth),
            loop_begin: BoundedStack::new(depth),
            loop_end: BoundedStack::new(depth),
            loop_count: BoundedStack::new(depth),
            loop_forever: BoundedStack::new(depth),
            sts_re: BoundedStack::new(depth),
            sts_im: BoundedStack::new(depth),
            sts_cplx: BoundedStack::new(depth),
            sts_mode: BoundedStack::new(depth),
        }
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_end.len()
    }

    /// Pushes all four loop entries, or none of them when the stacks are full.
    pub fn push_loop(&mut self, f: LoopFrame) -> bool {
        if self.loop_end.is_full() {
            self.loop_begin.overflow = true;
            self.loop_end.overflow = true;
            self.loop_count.overflow = true;
            self.loop_forever.overflow = true;
            return false;
        }
        self.loop_begin.push(f.begin);
        self.loop_end.push(f.end);
        self.loop_count.push(f.count);
        self.loop_forever.push(f.forever)
    }

    pub fn top_loop(&self) -> Option<LoopFrame> {
        Some(LoopFrame {
            begin: *self.loop_begin.top()?,
            end: *self.loop_end.top()?,
            count: *self.loop_count.top()?,
            forever: *self.loop_forever.top()?,
        })
    }

    pub fn pop_loop(&mut self) -> Option<LoopFrame> {
        let begin = self.loop_begin.pop();
        let end = self.loop_end.pop();
        let count = self.loop_count.pop();
        let forever = self.loop_forever.pop();
        Some(LoopFrame { begin: begin?, end: end?, count: count?, forever: forever? })
    }

    /// Counts the top loop down by one, wrapping 0 to 0xFFFF.
    pub fn decrement_loop(&mut self) {
        if let Some(c) = self.loop_count.top_mut() {
            *c = c.wrapping_sub(1);
        }
    }

    pub fn push_status(&mut self, s: StatusFrame) -> bool {
        if self.sts_mode.is_full() {
            self.sts_re.overflow = true;
            self.sts_im.overflow = true;
            self.sts_cplx.overflow = true;
            self.sts_mode.overflow = true;
            return false;
        }
        self.sts_re.push(s.re);
        self.sts_im.push(s.im);
        self.sts_cplx.push(s.cplx);
        self.sts_mode.push(s.mode)
    }

    pub fn pop_status(&mut self) -> Option<StatusFrame> {
        let re = self.sts_re.pop();
        let im = self.sts_im.pop();
        let cplx = self.sts_cplx.pop();
        let mode = self.sts_mode.pop();
        Some(StatusFrame { re: re?, im: im?, cplx: cplx?, mode: mode? })
    }

    /// Any sticky overflow or underflow flag, as `(stack name, overflow)`.
    pub fn faults(&self) -> Vec<(&'static str, bool)> {
        let mut out = Vec::new();
        let mut note = |name: &'static str, o: bool, u: bool| {
            if o {
                out.push((name, true));
            }
            if u {
                out.push((name, false));
            }
        };
        note("pc", self.pc.overflow, self.pc.underflow);
        note("loop", self.loop_end.overflow, self.loop_end.underflow);
        note("status", self.sts_mode.overflow, self.sts_mode.underflow);
        out
    }
}

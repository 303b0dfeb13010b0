//! The reorder window: a fixed-capacity ring of in-flight dynamic
//! instruction instances, FIFO by dynamic index. Stored indices are strictly
//! increasing and contiguous, so lookup by dynamic index is a constant-time
//! offset from the oldest entry.

use core_program::MemKind;
use thiserror::Error;

/// Pipeline stage or wait reason of an in-flight instance. The wait variants
/// only ever appear as a substate; they exist for timeline rendering and
/// stall attribution, not for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrState {
    Dispatch,
    Execute,
    WriteBack,
    Retire,
    WaitResource,
    WaitRetire,
    WaitData,
    WaitBandwidth,
    WaitCacheMiss,
    WaitCacheSecond,
    None,
}

impl InstrState {
    /// Single-letter timeline encoding.
    pub fn letter(self) -> char {
        match self {
            InstrState::Dispatch => 'D',
            InstrState::Execute => 'E',
            InstrState::WriteBack => 'W',
            InstrState::Retire => 'R',
            InstrState::WaitResource | InstrState::WaitBandwidth => '*',
            InstrState::WaitRetire => '-',
            InstrState::WaitData => '.',
            InstrState::WaitCacheMiss => '!',
            InstrState::WaitCacheSecond => '2',
            InstrState::None => ' ',
        }
    }
}

/// One dynamic instruction instance, created at dispatch and dropped at
/// retirement.
#[derive(Debug, Clone)]
pub struct InstrInstance {
    pub dyn_idx: usize,
    pub static_idx: usize,
    pub state: InstrState,
    pub substate: InstrState,
    pub port: Option<usize>,
    /// Cycle the instance entered the window.
    pub disp_cycle: u64,
    /// Cycle the instance started executing.
    pub exec_cycle: u64,
    /// Cycles left until execution completes.
    pub remaining: u64,
    pub mem: MemKind,
    pub mem_addr: Option<i64>,
    /// Accumulated execution latency, including stalled cycles; feeds the
    /// execution graph at retirement.
    pub exec_lat: u64,
}

impl InstrInstance {
    pub fn new(
        disp_cycle: u64,
        dyn_idx: usize,
        static_idx: usize,
        mem: MemKind,
        mem_addr: Option<i64>,
    ) -> Self {
        InstrInstance {
            dyn_idx,
            static_idx,
            state: InstrState::Dispatch,
            substate: InstrState::None,
            port: None,
            disp_cycle,
            exec_cycle: disp_cycle,
            remaining: 0,
            mem,
            mem_addr,
            exec_lat: 0,
        }
    }
}

/// Pushing into a full window is an internal invariant violation: the
/// scheduler checks `is_full` before every push.
#[derive(Debug, Error)]
#[error("reorder window overflow at capacity {capacity}")]
pub struct WindowOverflow {
    pub capacity: usize,
}

#[derive(Debug)]
pub struct ReorderWindow {
    buffer: Vec<Option<InstrInstance>>,
    first: usize,
    count: usize,
}

impl ReorderWindow {
    pub fn new(size: usize) -> Self {
        ReorderWindow {
            buffer: (0..size).map(|_| None).collect(),
            first: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.buffer.len()
    }

    /// Append the next dynamic instance.
    pub fn push(&mut self, instance: InstrInstance) -> Result<(), WindowOverflow> {
        if self.is_full() {
            return Err(WindowOverflow {
                capacity: self.capacity(),
            });
        }
        let slot = (self.first + self.count) % self.buffer.len();
        self.buffer[slot] = Some(instance);
        self.count += 1;
        Ok(())
    }

    /// Remove the `k` oldest instances; stops silently at empty.
    pub fn pop(&mut self, k: usize) {
        for _ in 0..k {
            if self.count == 0 {
                return;
            }
            self.buffer[self.first] = None;
            self.first = (self.first + 1) % self.buffer.len();
            self.count -= 1;
        }
    }

    /// Instance at logical position `pos` (0 = oldest).
    pub fn at(&self, pos: usize) -> &InstrInstance {
        assert!(pos < self.count, "window position out of range");
        self.buffer[(self.first + pos) % self.buffer.len()]
            .as_ref()
            .expect("occupied slot")
    }

    pub fn at_mut(&mut self, pos: usize) -> &mut InstrInstance {
        assert!(pos < self.count, "window position out of range");
        let len = self.buffer.len();
        self.buffer[(self.first + pos) % len]
            .as_mut()
            .expect("occupied slot")
    }

    /// Lookup by dynamic index; `None` when the instance has left the window
    /// (already retired) or has not been dispatched yet.
    pub fn get(&self, dyn_idx: usize) -> Option<&InstrInstance> {
        if self.count == 0 {
            return None;
        }
        let first_idx = self.at(0).dyn_idx;
        let last_idx = self.at(self.count - 1).dyn_idx;
        if dyn_idx < first_idx || dyn_idx > last_idx {
            return None;
        }
        Some(self.at(dyn_idx - first_idx))
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &InstrInstance> {
        (0..self.count).map(|pos| self.at(pos))
    }
}

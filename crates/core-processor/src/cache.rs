//! Fully-associative LRU data cache with write-back / write-allocate lines
//! and a main-memory bandwidth model: each memory transaction advances the
//! `mem_last_access` watermark by `issue_time` cycles, so misses queue behind
//! earlier traffic. A line whose fill is still in flight answers a secondary
//! miss (`ready + 1 - cycle` cycles) instead of a fresh transaction.

/// Access direction: reads are loads, writes mark the line modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss,
    SecondMiss,
}

/// Result of one access: extra latency in cycles, the outcome class, and the
/// main-memory transaction completion cycle when a transfer was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheAccess {
    pub latency: u64,
    pub outcome: AccessOutcome,
    pub mem_event: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Fraction of cycles the memory bus was busy (≤ 1.0).
    pub mm_usage: f64,
    /// Fraction of cycles spent on read transactions (≤ `mm_usage`).
    pub mm_read_usage: f64,
    pub read_misses: u64,
    pub write_misses: u64,
}

#[derive(Debug, Clone)]
pub struct Cache {
    block_size: u64,
    miss_penalty: i64,
    issue_time: i64,

    tags: Vec<i64>,
    /// Cycle at which the line's fill completes.
    ready: Vec<i64>,
    /// LRU rank per line; the victim has rank 0.
    lru: Vec<usize>,
    valid: Vec<bool>,
    modified: Vec<bool>,

    mem_reads: u64,
    mem_writes: u64,
    reads: u64,
    read_misses: u64,
    writes: u64,
    write_misses: u64,
    mem_last_access: i64,
}

impl Cache {
    pub fn new(lines: usize, block_size: u64, miss_penalty: i64, issue_time: i64) -> Self {
        let mut cache = Cache {
            block_size: block_size.max(1),
            miss_penalty,
            issue_time,
            tags: vec![0; lines],
            ready: vec![0; lines],
            lru: vec![0; lines],
            valid: vec![false; lines],
            modified: vec![false; lines],
            mem_reads: 0,
            mem_writes: 0,
            reads: 0,
            read_misses: 0,
            writes: 0,
            write_misses: 0,
            mem_last_access: 0,
        };
        cache.reset();
        cache
    }

    pub fn reset(&mut self) {
        self.mem_reads = 0;
        self.mem_writes = 0;
        self.reads = 0;
        self.read_misses = 0;
        self.writes = 0;
        self.write_misses = 0;
        self.mem_last_access = -self.issue_time;
        for (rank, slot) in self.lru.iter_mut().enumerate() {
            *slot = rank;
        }
        self.valid.fill(false);
        self.modified.fill(false);
    }

    fn search(&self, block: i64) -> Option<usize> {
        (0..self.tags.len()).find(|&i| self.valid[i] && self.tags[i] == block)
    }

    /// Promote `pos` to most-recently-used, demoting everything younger.
    fn touch_lru(&mut self, pos: usize) {
        let previous = self.lru[pos];
        for rank in self.lru.iter_mut() {
            if *rank > previous {
                *rank -= 1;
            }
        }
        self.lru[pos] = self.lru.len() - 1;
    }

    fn lru_victim(&self) -> usize {
        self.lru.iter().position(|&rank| rank == 0).unwrap_or(0)
    }

    pub fn access(&mut self, kind: AccessKind, address: i64, cycle: i64) -> CacheAccess {
        let block = address.div_euclid(self.block_size as i64);
        match kind {
            AccessKind::Read => self.reads += 1,
            AccessKind::Write => self.writes += 1,
        }

        let (pos, latency, outcome, mem_event) = match self.search(block) {
            Some(pos) if self.ready[pos] > cycle => {
                // Fill still in flight: one coalesced secondary miss per cycle.
                let latency = self.ready[pos] + 1 - cycle;
                self.ready[pos] += 1;
                (pos, latency, AccessOutcome::SecondMiss, None)
            }
            Some(pos) => (pos, 0, AccessOutcome::Hit, None),
            None => {
                match kind {
                    AccessKind::Read => self.read_misses += 1,
                    AccessKind::Write => self.write_misses += 1,
                }
                let pos = self.lru_victim();

                self.mem_last_access += self.issue_time;
                if cycle > self.mem_last_access {
                    self.mem_last_access = cycle;
                }
                let latency = self.mem_last_access - cycle + self.miss_penalty;

                if self.modified[pos] {
                    // Dirty victim: copy-back consumes one more transaction.
                    self.mem_writes += 1;
                    self.mem_last_access += self.issue_time;
                }
                self.mem_reads += 1;

                self.tags[pos] = block;
                self.valid[pos] = true;
                self.ready[pos] = cycle + latency;
                (pos, latency, AccessOutcome::Miss, Some(self.mem_last_access))
            }
        };

        self.modified[pos] = kind == AccessKind::Write;
        self.touch_lru(pos);
        tracing::trace!(
            target: "processor.cache",
            address,
            block,
            cycle,
            latency,
            ?outcome,
            "cache access"
        );
        CacheAccess {
            latency: latency.max(0) as u64,
            outcome,
            mem_event,
        }
    }

    /// Bandwidth and miss statistics over a finished run. Transactions are
    /// capped at `cycles / issue_time` so reported bandwidth never exceeds
    /// 1.0 (traffic issued past the end of the timeline is clipped).
    pub fn statistics(&self, cycles: u64) -> CacheStats {
        if cycles == 0 || self.issue_time <= 0 {
            return CacheStats {
                mm_usage: 0.0,
                mm_read_usage: 0.0,
                read_misses: self.read_misses,
                write_misses: self.write_misses,
            };
        }
        let issue = self.issue_time as u64;
        let mut mm_reads = self.mem_reads;
        let mut transactions = self.mem_reads + self.mem_writes;
        if transactions * issue > cycles {
            transactions = cycles / issue;
            mm_reads = mm_reads.min(transactions);
        }
        CacheStats {
            mm_usage: (transactions * issue) as f64 / cycles as f64,
            mm_read_usage: (mm_reads * issue) as f64 / cycles as f64,
            read_misses: self.read_misses,
            write_misses: self.write_misses,
        }
    }

    pub fn lines(&self) -> usize {
        self.tags.len()
    }

    /// Number of valid lines (used by the coalescing tests).
    pub fn occupancy(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

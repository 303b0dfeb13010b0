//! The execution graph: a DAG over the dispatch/execute/retire events of
//! every dynamic instruction, with edge weights measured during simulation.
//! Nodes `3i`, `3i+1`, `3i+2` are dispatch, execute and retire of dynamic
//! instruction `i`; each node stores its predecessor list, so the critical
//! path falls out of one reverse relaxation sweep from the final retire.
//!
//! Inter-instruction dispatch and retire edges are capped at one cycle: the
//! in-order front and back ends follow the instruction before them by
//! construction, and longer gaps are already explained by execute edges.

/// Flat predecessor-list DAG. Node count is `3 × dynamic instructions`.
#[derive(Debug)]
pub struct ExecutionGraph {
    nodes: Vec<Vec<(usize, i64)>>,
}

impl ExecutionGraph {
    /// Lay out nodes and structural edges before the run; measured weights
    /// are filled in by `record_retire`.
    pub fn build(
        total: usize,
        window_size: usize,
        n_static: usize,
        dep_offsets: &[Vec<usize>],
    ) -> Self {
        let mut nodes: Vec<Vec<(usize, i64)>> = Vec::with_capacity(3 * total);
        for i in 0..total {
            let mut dispatch: Vec<(usize, i64)> = Vec::new();
            if i > 0 {
                dispatch.push(((i - 1) * 3, 0));
            }
            if i >= window_size {
                // Window full: dispatch waits for the retire freeing the slot.
                dispatch.push(((i - window_size) * 3 + 2, 0));
            }
            nodes.push(dispatch);

            let mut execute: Vec<(usize, i64)> = vec![(i * 3, 1)];
            for &offset in &dep_offsets[i % n_static] {
                if let Some(j) = i.checked_sub(offset) {
                    execute.push((j * 3 + 1, 0));
                }
            }
            nodes.push(execute);

            let mut retire: Vec<(usize, i64)> = vec![(i * 3 + 1, 1)];
            if i > 0 {
                retire.push(((i - 1) * 3 + 2, 0));
            }
            nodes.push(retire);
        }
        ExecutionGraph { nodes }
    }

    /// Annotate the measured latencies of a retiring instruction. Dependence
    /// edges into its execute node read the producer's already-final retire
    /// weight, so in-order retirement guarantees they are settled here.
    pub fn record_retire(
        &mut self,
        dyn_idx: usize,
        disp_latency: i64,
        exec_latency: u64,
        ret_latency: i64,
    ) {
        let disp_latency = disp_latency.min(1);
        let ret_latency = ret_latency.min(1);

        if dyn_idx > 0 {
            self.nodes[dyn_idx * 3][0].1 = disp_latency;
        }

        let exec_node = dyn_idx * 3 + 1;
        let weights: Vec<i64> = self.nodes[exec_node][1..]
            .iter()
            .map(|&(producer_exec, _)| self.nodes[producer_exec + 1][0].1 - 1)
            .collect();
        for (idx, weight) in weights.into_iter().enumerate() {
            self.nodes[exec_node][idx + 1].1 = weight;
        }

        let retire_node = dyn_idx * 3 + 2;
        self.nodes[retire_node][0].1 += exec_latency as i64;
        if dyn_idx > 0 {
            self.nodes[retire_node][1].1 = ret_latency;
        }
    }

    /// Longest path from the first dispatch to the final retire, as
    /// `(node, weight)` entries ordered from the final retire backwards.
    pub fn longest_path(&self) -> Vec<(usize, i64)> {
        let n = self.nodes.len();
        if n == 0 {
            return Vec::new();
        }
        let mut dist: Vec<i64> = vec![i64::MIN; n];
        let mut parent: Vec<Option<(usize, i64)>> = vec![None; n];
        dist[n - 1] = 0;

        for u in (1..n).rev() {
            if dist[u] == i64::MIN {
                continue;
            }
            for &(v, w) in &self.nodes[u] {
                if dist[v] < dist[u] + w {
                    dist[v] = dist[u] + w;
                    parent[v] = Some((u, w));
                }
            }
        }

        let mut forward: Vec<(usize, i64)> = Vec::new();
        let mut v = 0;
        while let Some((u, w)) = parent[v] {
            forward.push((v, w));
            v = u;
        }
        let mut path = vec![(n - 1, 1)];
        path.extend(forward.into_iter().rev());
        path
    }
}

/// Critical-path weights bucketed by stage: per-static-instruction execute
/// cycles plus one dispatch and one retire bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalPath {
    pub nodes: Vec<(usize, i64)>,
    pub per_instr: Vec<i64>,
    pub dispatch: i64,
    pub retire: i64,
    pub total: i64,
}

impl CriticalPath {
    pub fn attribute(path: Vec<(usize, i64)>, n_static: usize) -> Self {
        let mut per_instr = vec![0i64; n_static];
        let mut dispatch = 0i64;
        let mut retire = 0i64;
        let mut total = 0i64;
        for &(node, weight) in &path {
            let static_idx = (node / 3) % n_static;
            match node % 3 {
                0 => dispatch += weight,
                1 => per_instr[static_idx] += weight,
                _ => retire += weight,
            }
            total += weight;
        }
        CriticalPath {
            nodes: path,
            per_instr,
            dispatch,
            retire,
            total,
        }
    }

    pub fn percent(&self, weight: i64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * weight as f64 / self.total as f64
        }
    }
}

//! core-processor: abstract out-of-order machine descriptions.
//!
//! A `Processor` carries the dispatch/execute/retire widths, the per-type
//! latency table, the execution-port table and its derived inverse, the
//! scheduler selector, and an optional data cache. Instruction types are
//! hierarchical dotted tags (`MEM.L.D`); resolution strips trailing segments
//! so a description can declare whole families without enumerating leaves.

mod cache;

pub use cache::{AccessKind, AccessOutcome, Cache, CacheAccess, CacheStats};

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("malformed processor source: {0}")]
    MalformedSource(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Port-assignment engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedKind {
    #[default]
    Greedy,
    Optimal,
}

/// One execution port and the instruction-type families it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDef {
    pub id: String,
    pub kinds: Vec<String>,
}

/// Latency and allowed ports resolved for one instruction type. Ports are
/// indices into `Processor::ports`, in port-table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub latency: u64,
    pub ports: Vec<usize>,
}

/// On-disk shape. `execute` defaults to the number of ports; cache enabled
/// iff `nBlocks > 0`.
#[derive(Deserialize)]
struct ProcessorSource {
    #[serde(default)]
    name: String,
    dispatch: u32,
    retire: u32,
    #[serde(default)]
    execute: Option<u32>,
    #[serde(default)]
    latencies: BTreeMap<String, u64>,
    #[serde(default)]
    ports: serde_json::Map<String, serde_json::Value>,
    #[serde(default, rename = "nBlocks")]
    n_blocks: usize,
    #[serde(default, rename = "blkSize")]
    blk_size: u64,
    #[serde(default, rename = "mPenalty")]
    m_penalty: i64,
    #[serde(default, rename = "mIssueTime")]
    m_issue_time: i64,
    #[serde(default)]
    sched: String,
}

#[derive(Debug, Clone)]
pub struct Processor {
    pub name: String,
    pub dispatch_width: u32,
    pub execute_width: u32,
    pub retire_width: u32,
    /// Uppercased type tag → latency.
    pub latencies: BTreeMap<String, u64>,
    /// Declaration order matters: the resolution fallback and the greedy
    /// assignor both pick the first matching port.
    pub ports: Vec<PortDef>,
    /// Uppercased type tag → port indices, port-table order.
    rports: BTreeMap<String, Vec<usize>>,
    pub sched: SchedKind,
    pub cache: Option<Cache>,
    n_blocks: usize,
    blk_size: u64,
    m_penalty: i64,
    m_issue_time: i64,
}

impl Processor {
    pub fn from_json(text: &str) -> Result<Self, ProcessorError> {
        let src: ProcessorSource = serde_json::from_str(text)?;

        let mut ports: Vec<PortDef> = Vec::with_capacity(src.ports.len());
        for (id, kinds) in &src.ports {
            let kinds: Vec<String> = serde_json::from_value(kinds.clone())?;
            ports.push(PortDef {
                id: id.clone(),
                kinds: kinds.iter().map(|k| k.to_ascii_uppercase()).collect(),
            });
        }
        if ports.is_empty() {
            return Err(ProcessorError::Configuration(
                "the port table is empty".into(),
            ));
        }

        let execute = src.execute.unwrap_or(ports.len() as u32);
        for (stage, width) in [
            ("dispatch", src.dispatch),
            ("execute", execute),
            ("retire", src.retire),
        ] {
            if width == 0 {
                return Err(ProcessorError::Configuration(format!(
                    "{stage} width must be nonzero"
                )));
            }
        }

        let mut rports: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, port) in ports.iter().enumerate() {
            for kind in &port.kinds {
                rports.entry(kind.clone()).or_default().push(idx);
            }
        }

        let latencies = src
            .latencies
            .iter()
            .map(|(k, &v)| (k.to_ascii_uppercase(), v))
            .collect();

        let sched = match src.sched.as_str() {
            "optimal" => SchedKind::Optimal,
            "greedy" | "" => SchedKind::Greedy,
            other => {
                tracing::warn!(target: "processor", sched = other, "unknown scheduler, using greedy");
                SchedKind::Greedy
            }
        };

        let cache = (src.n_blocks > 0)
            .then(|| Cache::new(src.n_blocks, src.blk_size, src.m_penalty, src.m_issue_time));

        Ok(Processor {
            name: src.name,
            dispatch_width: src.dispatch,
            execute_width: execute,
            retire_width: src.retire,
            latencies,
            ports,
            rports,
            sched,
            cache,
            n_blocks: src.n_blocks,
            blk_size: src.blk_size,
            m_penalty: src.m_penalty,
            m_issue_time: src.m_issue_time,
        })
    }

    /// Resolve an instruction type to its latency and allowed ports,
    /// stripping trailing `.segment`s until both tables answer. Unknown
    /// families fall back to latency 1 on the first port.
    pub fn get_resource(&self, kind: &str) -> Resource {
        let latency = resolve(&self.latencies, kind).copied();
        let ports = resolve(&self.rports, kind).cloned();
        match (latency, ports) {
            (Some(latency), Some(ports)) => Resource { latency, ports },
            _ => Resource {
                latency: 1,
                ports: vec![0],
            },
        }
    }

    pub fn n_ports(&self) -> usize {
        self.ports.len()
    }

    /// Clear all mutable state (the cache tables). Called by the scheduler on
    /// load so consecutive runs are independent.
    pub fn reset(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.reset();
        }
    }

    /// Description dump, mirroring the source format plus the derived
    /// reverse-port table.
    pub fn to_json(&self) -> String {
        let mut ports = serde_json::Map::new();
        for port in &self.ports {
            ports.insert(port.id.clone(), serde_json::json!(port.kinds));
        }
        let mut rports = serde_json::Map::new();
        for (kind, indices) in &self.rports {
            let ids: Vec<&str> = indices.iter().map(|&i| self.ports[i].id.as_str()).collect();
            rports.insert(kind.clone(), serde_json::json!(ids));
        }
        let value = serde_json::json!({
            "name": self.name,
            "sched": match self.sched {
                SchedKind::Greedy => "greedy",
                SchedKind::Optimal => "optimal",
            },
            "dispatch": self.dispatch_width,
            "execute": self.execute_width,
            "retire": self.retire_width,
            "latencies": self.latencies,
            "ports": ports,
            "rports": rports,
            "nBlocks": self.n_blocks,
            "blkSize": self.blk_size,
            "mPenalty": self.m_penalty,
            "mIssueTime": self.m_issue_time,
        });
        serde_json::to_string_pretty(&value).expect("processor description serializes")
    }
}

fn resolve<'a, V>(map: &'a BTreeMap<String, V>, kind: &str) -> Option<&'a V> {
    let mut key = kind.to_ascii_uppercase();
    loop {
        if let Some(value) = map.get(&key) {
            return Some(value);
        }
        match key.rfind('.') {
            Some(pos) => key.truncate(pos),
            None => return None,
        }
    }
}

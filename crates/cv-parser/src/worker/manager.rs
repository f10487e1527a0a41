//! The three isolated pools: parsing, OCR, LLM.
//!
//! Isolation is the point: a flood of slow OCR jobs must not starve quick
//! PDF decodes, and LLM latency spikes must not back up either of them.

use crate::config::PoolsConfig;
use crate::error::WorkerError;
use crate::worker::pool::{DrainReport, WorkPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Parsing,
    Ocr,
    Llm,
}

pub struct WorkPoolManager {
    parsing: WorkPool,
    ocr: WorkPool,
    llm: WorkPool,
}

impl WorkPoolManager {
    pub fn new(config: &PoolsConfig) -> Self {
        Self {
            parsing: WorkPool::new("parsing", config.parsing),
            ocr: WorkPool::new("ocr", config.ocr),
            llm: WorkPool::new("llm", config.llm),
        }
    }

    pub fn execute<T, F>(&self, kind: PoolKind, f: F) -> Result<T, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.pool(kind).execute(f)
    }

    pub fn pool(&self, kind: PoolKind) -> &WorkPool {
        match kind {
            PoolKind::Parsing => &self.parsing,
            PoolKind::Ocr => &self.ocr,
            PoolKind::Llm => &self.llm,
        }
    }

    /// Stops accepting work on all pools at once, before any drain wait
    /// begins.
    pub fn begin_shutdown(&self) {
        self.parsing.begin_shutdown();
        self.ocr.begin_shutdown();
        self.llm.begin_shutdown();
    }

    /// Drains the pools sequentially, each within its own window.
    pub fn drain(&self) -> Vec<DrainReport> {
        self.begin_shutdown();
        vec![self.parsing.drain(), self.ocr.drain(), self.llm.drain()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pools_are_independent() {
        let manager = WorkPoolManager::new(&PoolsConfig::default());
        let a = manager.execute(PoolKind::Parsing, || "parsing").unwrap();
        let b = manager.execute(PoolKind::Llm, || "llm").unwrap();
        assert_eq!(a, "parsing");
        assert_eq!(b, "llm");
    }

    #[test]
    fn test_shutdown_covers_all_pools() {
        let manager = WorkPoolManager::new(&PoolsConfig::default());
        manager.begin_shutdown();
        for kind in [PoolKind::Parsing, PoolKind::Ocr, PoolKind::Llm] {
            assert!(manager.execute(kind, || ()).is_err());
        }
    }

    #[test]
    fn test_drain_reports_all_pools() {
        let manager = WorkPoolManager::new(&PoolsConfig::default());
        let reports = manager.drain();
        let names: Vec<_> = reports.iter().map(|r| r.pool).collect();
        assert_eq!(names, vec!["parsing", "ocr", "llm"]);
    }
}

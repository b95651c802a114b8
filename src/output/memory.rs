use crate::content::PageDocument;
use crate::output::traits::{CrawlReport, OutputResult, PageSink};
use std::sync::{Arc, Mutex, MutexGuard};

/// Sink that keeps documents in memory
///
/// Clones share the same buffers, so a caller can hand one clone to the
/// coordinator and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    documents: Arc<Mutex<Vec<PageDocument>>>,
    reports: Arc<Mutex<Vec<CrawlReport>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents persisted so far, in persist order
    pub fn documents(&self) -> Vec<PageDocument> {
        lock(&self.documents).clone()
    }

    pub fn reports(&self) -> Vec<CrawlReport> {
        lock(&self.reports).clone()
    }
}

impl PageSink for MemorySink {
    fn persist(&mut self, document: &PageDocument) -> OutputResult<()> {
        lock(&self.documents).push(document.clone());
        Ok(())
    }

    fn finalize(&mut self, report: &CrawlReport) -> OutputResult<()> {
        lock(&self.reports).push(report.clone());
        Ok(())
    }
}

use crate::item::WorkItem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Thread-safe collection of completed [`WorkItem`]s.
///
/// Items are kept as a stack; `snapshot` and `drain` hand them back newest first.
#[derive(Debug, Default)]
pub struct ResultSink {
    items: Mutex<Vec<WorkItem>>,
}

impl ResultSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: WorkItem) {
        self.lock().push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<WorkItem> {
        self.lock().iter().find(|item| item.id() == id).cloned()
    }

    /// Copy of the current contents, newest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.lock().iter().rev().cloned().collect()
    }

    /// Take every item out of the sink, newest first
    pub fn drain(&self) -> Vec<WorkItem> {
        let mut items = std::mem::take(&mut *self.lock());
        items.reverse();
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_is_newest_first() {
        let sink = ResultSink::new();
        let first = WorkItem::new("https://example.test/1");
        let second = WorkItem::new("https://example.test/2");
        sink.push(first.clone());
        sink.push(second.clone());

        assert_eq!(sink.snapshot(), vec![second, first]);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_drain_empties_sink() {
        let sink = ResultSink::new();
        let item = WorkItem::new("https://example.test/1");
        sink.push(item.clone());

        assert_eq!(sink.find(item.id()), Some(item.clone()));
        assert_eq!(sink.drain(), vec![item]);
        assert!(sink.is_empty());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_concurrent_pushes() {
        let sink = Arc::new(ResultSink::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        sink.push(WorkItem::new(format!("https://example.test/{t}/{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 800);
    }
}

//! Bounded in-process FIFO queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::BusError;

/// Multi-producer FIFO with atomic push/pop and a hard capacity.
///
/// Producers push from any task; each queue has a single logical consumer
/// (the pipeline component that owns the drain side). A full queue rejects
/// the push so the edge can surface backpressure instead of growing
/// without bound.
pub struct Fifo<T> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

impl<T> Fifo<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append one item. Fails with [`BusError::Full`] at capacity.
    pub fn push(&self, item: T) -> Result<(), BusError> {
        let mut q = self.inner.lock().expect("queue lock poisoned");
        if q.len() >= self.capacity {
            return Err(BusError::Full(self.name));
        }
        q.push_back(item);
        Ok(())
    }

    /// Remove and return the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().expect("queue lock poisoned").pop_front()
    }

    /// Remove and return up to `max` oldest items, preserving order.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut q = self.inner.lock().expect("queue lock poisoned");
        let n = max.min(q.len());
        q.drain(..n).collect()
    }

    /// Best-effort instantaneous length.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_fifo() {
        let q = Fifo::new("test_queue", 16);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_rejects_at_capacity() {
        let q = Fifo::new("tiny", 2);
        q.push("a").unwrap();
        q.push("b").unwrap();
        let err = q.push("c").unwrap_err();
        assert!(matches!(err, BusError::Full("tiny")));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn drain_takes_oldest_first() {
        let q = Fifo::new("drain", 16);
        for i in 0..5 {
            q.push(i).unwrap();
        }
        assert_eq!(q.drain(3), vec![0, 1, 2]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.drain(10), vec![3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        use std::sync::Arc;

        let q = Arc::new(Fifo::new("mp", 1000));
        let mut handles = Vec::new();
        for t in 0..4 {
            let q = q.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    q.push(t * 100 + i).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 400);
    }
}

use std::collections::VecDeque;
use std::sync::Mutex;

/// Lock-protected double-ended queue shared by one producer loop and one consumer loop.
///
/// Retries are re-injected with `push_back`, so a failing item goes behind
/// everything already waiting.
#[derive(Debug)]
pub struct TaskDeque<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for TaskDeque<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> TaskDeque<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_back(&self, item: T) {
        self.lock().push_back(item);
    }

    pub fn push_front(&self, item: T) {
        self.lock().push_front(item);
    }

    pub fn pop_front(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn pop_back(&self) -> Option<T> {
        self.lock().pop_back()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> FromIterator<T> for TaskDeque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: Mutex::new(iter.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_with_reinjection_at_tail() {
        let q: TaskDeque<i32> = [1, 2, 3].into_iter().collect();
        let first = q.pop_front().unwrap();
        assert_eq!(first, 1);
        q.push_back(first);
        assert_eq!(q.pop_front(), Some(2));
        assert_eq!(q.pop_front(), Some(3));
        assert_eq!(q.pop_front(), Some(1));
        assert!(q.is_empty());
    }

    #[test]
    fn both_ends() {
        let q = TaskDeque::new();
        q.push_back("b");
        q.push_front("a");
        q.push_back("c");
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop_back(), Some("c"));
        assert_eq!(q.pop_front(), Some("a"));
        assert_eq!(q.pop_front(), Some("b"));
        assert_eq!(q.pop_back(), None);
    }

    #[test]
    fn concurrent_push_pop_loses_nothing() {
        let q = Arc::new(TaskDeque::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        q.push_back(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut seen = Vec::new();
        while let Some(v) = q.pop_front() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..4000).collect::<Vec<_>>());
    }
}

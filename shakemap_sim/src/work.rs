//! Dynamic work claiming over a rupture catalog.

use std::ops::Range;
use std::sync::{Mutex, PoisonError};

/// Half-open index interval `[start, end)` over the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRange {
    pub start: usize,
    pub end: usize,
}

impl WorkRange {
    /// Number of ruptures in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    
    /// True for an empty range.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
    
    /// Indices covered by the range.
    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Shared cursor handing out disjoint ranges to workers.
///
/// Each claim takes `ceil(remaining / workers)` indices, so chunks start
/// large and shrink as the catalog drains, which keeps late workers from
/// idling behind one big tail chunk.
#[derive(Debug)]
pub struct WorkQueue {
    /// Next unclaimed index
    cursor: Mutex<usize>,
    
    len: usize,
    num_workers: usize,
}

impl WorkQueue {
    /// Creates a queue over `len` items for `num_workers` workers (at least 1).
    pub fn new(len: usize, num_workers: usize) -> Self {
        Self {
            cursor: Mutex::new(0),
            len,
            num_workers: num_workers.max(1),
        }
    }
    
    /// Total number of items.
    pub fn len(&self) -> usize {
        self.len
    }
    
    /// True when the queue covers no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    
    /// Claims the next range, or `None` once the catalog is exhausted.
    pub fn claim_next(&self) -> Option<WorkRange> {
        // The cursor is a plain integer; a panicking holder cannot leave it torn
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if *cursor >= self.len {
            return None;
        }
        
        let remaining = self.len - *cursor;
        let chunk = remaining.div_ceil(self.num_workers);
        let range = WorkRange {
            start: *cursor,
            end: *cursor + chunk,
        };
        *cursor = range.end;
        Some(range)
    }
    
    /// Number of items not yet claimed.
    pub fn remaining(&self) -> usize {
        let cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        self.len.saturating_sub(*cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    
    #[test]
    fn test_chunks_shrink_as_work_depletes() {
        let queue = WorkQueue::new(10, 3);
        let ranges: Vec<WorkRange> = std::iter::from_fn(|| queue.claim_next()).collect();
        
        assert_eq!(ranges[0], WorkRange { start: 0, end: 4 });
        assert_eq!(ranges[1], WorkRange { start: 4, end: 6 });
        assert_eq!(ranges[2], WorkRange { start: 6, end: 8 });
        assert_eq!(ranges[3], WorkRange { start: 8, end: 9 });
        assert_eq!(ranges[4], WorkRange { start: 9, end: 10 });
        assert_eq!(ranges.len(), 5);
        assert_eq!(queue.remaining(), 0);
        assert!(queue.claim_next().is_none());
    }
    
    #[test]
    fn test_empty_queue_has_no_work() {
        let queue = WorkQueue::new(0, 4);
        assert!(queue.claim_next().is_none());
    }
    
    #[test]
    fn test_zero_workers_treated_as_one() {
        let queue = WorkQueue::new(5, 0);
        assert_eq!(queue.claim_next(), Some(WorkRange { start: 0, end: 5 }));
    }
    
    proptest! {
        #[test]
        fn prop_sequential_claims_partition_catalog(n in 1usize..500, k_seed in 1usize..64) {
            let k = 1 + (k_seed - 1) % n;
            let queue = WorkQueue::new(n, k);
            let mut next_expected = 0;
            while let Some(range) = queue.claim_next() {
                prop_assert_eq!(range.start, next_expected);
                prop_assert!(!range.is_empty());
                next_expected = range.end;
            }
            prop_assert_eq!(next_expected, n);
        }
        
        #[test]
        fn prop_concurrent_claims_partition_catalog(n in 1usize..400, k_seed in 1usize..16) {
            let k = 1 + (k_seed - 1) % n;
            let queue = Arc::new(WorkQueue::new(n, k));
            let handles: Vec<_> = (0..k)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut claimed = Vec::new();
                        while let Some(range) = queue.claim_next() {
                            claimed.push(range);
                        }
                        claimed
                    })
                })
                .collect();
            
            let mut seen = vec![0u32; n];
            for h in handles {
                for range in h.join().unwrap() {
                    for i in range.indices() {
                        seen[i] += 1;
                    }
                }
            }
            prop_assert!(seen.iter().all(|&c| c == 1));
        }
    }
}

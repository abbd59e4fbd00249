// SPDX-License-Identifier: Apache-2.0

//! Static splitting of a row (or key) count into per-worker ranges.

/// Half-open range `[start, start + size)` handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkRange {
    pub start: usize,
    pub size: usize,
}

impl WorkRange {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

/// Splits `total` items across `workers` contiguous ranges.
///
/// Always returns exactly `workers` entries (at least one). With at least as
/// many items as workers, every range gets `total / workers` items and the
/// last one also takes the remainder. With fewer items than workers, the
/// first `total` ranges hold one item each and the rest are empty
/// placeholders positioned at `total`.
pub fn partition(total: usize, workers: usize) -> Vec<WorkRange> {
    let workers = workers.max(1);
    if total < workers {
        return (0..workers)
            .map(|i| {
                if i < total {
                    WorkRange { start: i, size: 1 }
                } else {
                    WorkRange {
                        start: total,
                        size: 0,
                    }
                }
            })
            .collect();
    }

    let base = total / workers;
    let remainder = total - base * workers;
    let mut ranges: Vec<WorkRange> = (0..workers)
        .map(|i| WorkRange {
            start: i * base,
            size: base,
        })
        .collect();
    if let Some(last) = ranges.last_mut() {
        last.size += remainder;
    }
    ranges
}

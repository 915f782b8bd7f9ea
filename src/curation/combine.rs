//! Merging several sequences into one.

use serde::{Deserialize, Serialize};

/// Which input length drives [`alternate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Stop once the shortest sequence runs out.
    Min,
    /// Keep going until the longest sequence runs out.
    Max,
}

/// Appends every sequence to `target`, in order.
pub fn push<T, I>(target: &mut Vec<T>, sequences: I)
where
    I: IntoIterator<Item = Vec<T>>,
{
    for sequence in sequences {
        target.extend(sequence);
    }
}

/// Round-robin interleave by index: element 0 of each sequence, then
/// element 1 of each, and so on. Exhausted sequences are skipped.
pub fn alternate<T: Clone, S: AsRef<[T]>>(bound: Bound, sequences: &[S]) -> Vec<T> {
    let lengths = sequences.iter().map(|s| s.as_ref().len());
    let limit = match bound {
        Bound::Min => lengths.min(),
        Bound::Max => lengths.max(),
    }
    .unwrap_or(0);

    let mut result = Vec::new();
    for index in 0..limit {
        for sequence in sequences {
            if let Some(item) = sequence.as_ref().get(index) {
                result.push(item.clone());
            }
        }
    }
    result
}

/// Interleaves runs of `x_row` items from `x` with runs of `y_row` items
/// from `y`. With `stop_when_short`, stops before the first step where
/// either side can no longer supply a full run.
pub fn mixin<T: Clone>(x: &[T], y: &[T], x_row: usize, y_row: usize, stop_when_short: bool) -> Vec<T> {
    let mut result = Vec::with_capacity(x.len() + y.len());
    let steps = x.len().max(y.len());

    for step in 0..steps {
        let x_start = step * x_row;
        let y_start = step * y_row;
        if x_start >= x.len() && y_start >= y.len() {
            break;
        }
        result.extend_from_slice(run(x, x_start, x_row));
        result.extend_from_slice(run(y, y_start, y_row));

        let next_full = |len: usize, row: usize| row > 0 && (step + 2) * row <= len;
        if stop_when_short && !(next_full(x.len(), x_row) && next_full(y.len(), y_row)) {
            break;
        }
    }
    result
}

fn run<T>(items: &[T], start: usize, len: usize) -> &[T] {
    let start = start.min(items.len());
    let end = (start + len).min(items.len());
    &items[start..end]
}

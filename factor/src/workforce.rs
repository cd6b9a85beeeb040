//! The parallel/serial dispatch strategy for [`crate::Factor`] sweeps.
//!
//! This is a thin wrapper around a scoped `rayon` fan-out, in the same
//! spirit as the `Worker` type used to drive evaluation-domain FFTs in
//! comparable numeric crates: callers pick an intent (parallel or forced
//! serial), and the sweep helpers here pick the actual chunking strategy
//! per operation, because `refine`, `marginalize` and `combine` have
//! different disjoint-write shapes.

use crate::factor::PARALLEL_THRESHOLD;

/// Caller-selected execution strategy for a single [`crate::Factor`] operation.
///
/// `Serial` always runs the sweep on the calling thread. `Parallel` is a
/// *request*; whether it is honored also depends on the table being large
/// enough to amortize the `rayon` scope overhead (see [`PARALLEL_THRESHOLD`])
/// and on the `parallel` feature being enabled at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workforce {
    /// Force single-threaded execution regardless of table size.
    Serial,
    /// Use a scoped worker pool when the table is large enough.
    #[default]
    Parallel,
}

impl Workforce {
    /// Number of workers this strategy would use for a table of `len` entries.
    /// Returns `1` whenever the sweep should run serially, either because
    /// the caller asked for [`Workforce::Serial`] or because `len` is below
    /// [`PARALLEL_THRESHOLD`].
    #[cfg_attr(not(feature = "parallel"), allow(unused_variables))]
    pub(crate) fn effective_threads(self, len: usize) -> usize {
        #[cfg(feature = "parallel")]
        {
            if self == Workforce::Parallel && len >= PARALLEL_THRESHOLD {
                rayon::current_num_threads().max(1)
            } else {
                1
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }
}

/// Splits `result[..]` into contiguous chunks and fills each entry with
/// `compute(index)`. Safe to parallelize unconditionally: every index is
/// written exactly once, by exactly one worker, into a disjoint slice.
/// This is the partitioning [`crate::Factor::combine`] uses.
pub(crate) fn fill_disjoint(workforce: Workforce, result: &mut [f64], compute: impl Fn(usize) -> f64 + Sync) {
    let threads = workforce.effective_threads(result.len());
    if threads <= 1 {
        for (i, slot) in result.iter_mut().enumerate() {
            *slot = compute(i);
        }
        return;
    }
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let chunk_size = (result.len() / threads).max(1);
        result.par_chunks_mut(chunk_size).enumerate().for_each(|(chunk_index, chunk)| {
            let base = chunk_index * chunk_size;
            for (offset, slot) in chunk.iter_mut().enumerate() {
                *slot = compute(base + offset);
            }
        });
        return;
    }
    #[cfg(not(feature = "parallel"))]
    unreachable!("effective_threads never reports >1 worker without the parallel feature")
}

/// Sums `len` source entries into an output table of length `out_len` via
/// `project(i)`, a (possibly many-to-one) map from source index to output
/// index. Because multiple source indices can project to the same output
/// cell, this cannot safely write a shared output table from multiple
/// workers; instead each worker accumulates into a private buffer and the
/// buffers are summed once all workers finish. This is the partitioning
/// [`crate::Factor::marginalize`] uses.
pub(crate) fn fold_projected(
    workforce: Workforce,
    len: usize,
    out_len: usize,
    project: impl Fn(usize) -> usize + Sync,
    source: impl Fn(usize) -> f64 + Sync,
) -> Vec<f64> {
    let threads = workforce.effective_threads(len);
    if threads <= 1 {
        let mut out = vec![0.0_f64; out_len];
        for i in 0..len {
            out[project(i)] += source(i);
        }
        return out;
    }
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let chunk_size = (len / threads).max(1);
        let chunk_count = (len + chunk_size - 1) / chunk_size;
        let partials: Vec<Vec<f64>> = (0..chunk_count)
            .into_par_iter()
            .map(|chunk_index| {
                let start = chunk_index * chunk_size;
                let end = (start + chunk_size).min(len);
                let mut local = vec![0.0_f64; out_len];
                for i in start..end {
                    local[project(i)] += source(i);
                }
                local
            })
            .collect();
        let mut out = vec![0.0_f64; out_len];
        for partial in partials {
            for (slot, value) in out.iter_mut().zip(partial) {
                *slot += value;
            }
        }
        return out;
    }
    #[cfg(not(feature = "parallel"))]
    unreachable!("effective_threads never reports >1 worker without the parallel feature")
}

/// Applies the `refine` update (see [`crate::Factor::refine`]) to every
/// `{i, i ^ (1 << pivot_bit)}` pair in `table`.
///
/// A naive contiguous split of the raw `0..table.len()` range is unsafe
/// here, because a pair can straddle the boundary between two chunks. But
/// a physical block of `2 << pivot_bit` consecutive entries contains
/// *exactly* the bits below `pivot_bit` (free) crossed with the pivot bit
/// itself (0 then 1) for one fixed value of the bits above the pivot — in
/// other words, every pair touched by this block is wholly contained in
/// it. So splitting the table into chunks whose length is a multiple of
/// that block size is safe and requires no unsafe code: each worker's
/// chunk is simply a concatenation of whole, self-contained blocks.
pub(crate) fn refine_pairs(workforce: Workforce, table: &mut [f64], pivot_bit: u32, positive: bool, c: f64) {
    let block = 2usize << pivot_bit;
    let threads = workforce.effective_threads(table.len());
    if threads <= 1 {
        apply_blocks(table, block, positive, c);
        return;
    }
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let blocks_total = table.len() / block;
        let blocks_per_chunk = (blocks_total / threads).max(1);
        let chunk_size = blocks_per_chunk * block;
        table.par_chunks_mut(chunk_size).for_each(|chunk| {
            apply_blocks(chunk, block, positive, c);
        });
        return;
    }
    #[cfg(not(feature = "parallel"))]
    unreachable!("effective_threads never reports >1 worker without the parallel feature")
}

fn apply_blocks(slice: &mut [f64], block: usize, positive: bool, c: f64) {
    let half = block / 2;
    let mut start = 0;
    while start < slice.len() {
        let block_slice = &mut slice[start..start + block];
        for low in 0..half {
            let zero_bit = low;
            let one_bit = low + half;
            let (pos_idx, neg_idx) = if positive { (one_bit, zero_bit) } else { (zero_bit, one_bit) };
            let neg_val = block_slice[neg_idx];
            block_slice[pos_idx] += c * neg_val;
            block_slice[neg_idx] *= 1.0 - c;
        }
        start += block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_pairs_touch_every_world_exactly_once() {
        let mut table = vec![1.0_f64; 16];
        refine_pairs(Workforce::Serial, &mut table, 1, true, 0.0);
        // c = 0 must be a strict no-op.
        assert!(table.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn fold_projected_conserves_total_mass() {
        let input = [0.1_f64, 0.2, 0.1, 0.2, 0.1, 0.1, 0.1, 0.1];
        let out = fold_projected(Workforce::Serial, input.len(), 2, |i| i & 1, |i| input[i]);
        let total_in: f64 = input.iter().sum();
        let total_out: f64 = out.iter().sum();
        assert!((total_in - total_out).abs() < 1e-12);
    }

    #[test]
    fn fill_disjoint_writes_every_index() {
        let mut table = vec![0.0_f64; 8];
        fill_disjoint(Workforce::Serial, &mut table, |i| i as f64);
        assert_eq!(table, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }
}

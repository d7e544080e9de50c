//! Parallel nonce search.

use std::sync::atomic::{AtomicUsize, Ordering};

use memwallet_primitives::block::BlockHeader;
use rayon::prelude::*;

use crate::difficulty::{compact_to_target, hash_meets_target, CompactError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    Compact(CompactError),
    Exhausted,
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Compact(err) => write!(f, "{err}"),
            SolveError::Exhausted => write!(f, "no nonce satisfies the target"),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<CompactError> for SolveError {
    fn from(err: CompactError) -> Self {
        SolveError::Compact(err)
    }
}

const CANCEL_CHECK_INTERVAL: u32 = 4096;

/// Searches the full `u32` nonce space for a header hash at or below the
/// target encoded in `header.bits`, writing the winning nonce into `header`.
///
/// The space is split into one contiguous range per rayon worker. A worker
/// gives up once a lower-numbered range has reported a solution, so the
/// result is the lowest solving nonce of the lowest solving range and does
/// not depend on scheduling.
pub fn solve_header(header: &mut BlockHeader) -> Result<u32, SolveError> {
    let target = compact_to_target(header.bits)?;
    let workers = rayon::current_num_threads().max(1);
    let per_worker = u32::MAX / workers as u32;
    let best = AtomicUsize::new(usize::MAX);
    let template = header.clone();

    let found = (0..workers).into_par_iter().find_map_first(|worker| {
        let start = per_worker * worker as u32;
        let stop = if worker + 1 == workers {
            u32::MAX
        } else {
            start + per_worker - 1
        };
        let mut candidate = template.clone();
        let mut nonce = start;
        loop {
            if (nonce - start) % CANCEL_CHECK_INTERVAL == 0 && best.load(Ordering::Relaxed) < worker
            {
                return None;
            }
            candidate.nonce = nonce;
            if hash_meets_target(&candidate.hash(), &target) {
                best.fetch_min(worker, Ordering::Relaxed);
                return Some(nonce);
            }
            if nonce == stop {
                return None;
            }
            nonce += 1;
        }
    });

    let nonce = found.ok_or(SolveError::Exhausted)?;
    header.nonce = nonce;
    Ok(nonce)
}

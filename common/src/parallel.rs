//! Thread-budget helpers.
//!
//! Nothing in this workspace runs on rayon's global pool. Every parallel
//! operation receives an explicit thread count and runs inside a pool built
//! for that call, which is torn down before the call returns.

use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};

/// Runs `op` inside a dedicated pool of `num_threads` workers.
///
/// The pool is dropped (and its workers joined) before returning. A budget of
/// zero is treated as one thread.
pub fn with_thread_budget<R, F>(num_threads: usize, op: F) -> Result<R, ThreadPoolBuildError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("spot-worker-{i}"))
        .build()?;
    Ok(pool.install(op))
}

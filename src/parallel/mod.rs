//! Parallel execution primitives.
//!
//! `Executor` is the index-range parallel-for: a backend picked once (from
//! configuration or at startup) and passed to every operator that fans work
//! out per channel. `Combinable` collects per-thread results during such a
//! fan-out.
//!
//! Panics raised by an operation are propagated to the caller after every
//! worker has joined, carrying the original payload. Indices that had not
//! started when the panic happened may or may not run.

use std::num::NonZeroUsize;
use std::panic;
use std::thread;

mod combinable;

pub use combinable::{Combinable, LocalGuard};

/// Execution backend for index-range fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Executor {
    /// Runs every index on the calling thread, in order.
    Sequential,
    /// Splits the range into contiguous blocks, one scoped thread per block.
    Scoped {
        /// Maximum number of worker threads.
        workers: NonZeroUsize,
    },
    /// Uses the rayon global thread pool.
    #[cfg(feature = "rayon")]
    Rayon,
}

impl Default for Executor {
    fn default() -> Self {
        Self::preferred()
    }
}

impl Executor {
    /// Best backend compiled into this build.
    ///
    /// Rayon when the `rayon` feature is enabled, otherwise scoped threads
    /// sized to the available parallelism.
    pub fn preferred() -> Self {
        #[cfg(feature = "rayon")]
        {
            Self::Rayon
        }
        #[cfg(not(feature = "rayon"))]
        {
            Self::scoped(0)
        }
    }

    /// Scoped-thread backend with `workers` threads; `0` means the available
    /// parallelism of the machine.
    pub fn scoped(workers: usize) -> Self {
        let workers = NonZeroUsize::new(workers)
            .or_else(|| thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN);
        Self::Scoped { workers }
    }

    /// Short backend name for logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Scoped { .. } => "scoped",
            #[cfg(feature = "rayon")]
            Self::Rayon => "rayon",
        }
    }

    /// Invokes `op(i)` exactly once for every `i` in `0..n` and returns when
    /// all invocations have finished.
    ///
    /// Invocations may run concurrently and in any order; `op` must only
    /// write memory that is disjoint per index.
    pub fn parallel_for<F>(&self, n: usize, op: F)
    where
        F: Fn(usize) + Sync,
    {
        if n == 0 {
            return;
        }
        match *self {
            Self::Sequential => (0..n).for_each(op),
            Self::Scoped { workers } => {
                let workers = workers.get().min(n);
                if workers == 1 {
                    (0..n).for_each(op);
                    return;
                }
                let block = n.div_ceil(workers);
                let op = &op;
                scoped_join(workers, |w| {
                    let start = w * block;
                    let end = (start + block).min(n);
                    (start..end).for_each(op);
                });
            }
            #[cfg(feature = "rayon")]
            Self::Rayon => {
                use rayon::prelude::*;
                (0..n).into_par_iter().for_each(&op);
            }
        }
    }

    /// Splits `data` into consecutive chunks of `chunk_len` elements and
    /// invokes `op(k, chunk)` once per chunk, where `k` is the chunk index.
    ///
    /// The last chunk is shorter when `chunk_len` does not divide
    /// `data.len()`. A `chunk_len` of zero runs nothing.
    pub fn for_each_chunk_mut<T, F>(&self, data: &mut [T], chunk_len: usize, op: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if chunk_len == 0 || data.is_empty() {
            return;
        }
        match *self {
            Self::Sequential => {
                for (k, chunk) in data.chunks_mut(chunk_len).enumerate() {
                    op(k, chunk);
                }
            }
            Self::Scoped { workers } => {
                let n_chunks = data.len().div_ceil(chunk_len);
                let workers = workers.get().min(n_chunks);
                if workers == 1 {
                    for (k, chunk) in data.chunks_mut(chunk_len).enumerate() {
                        op(k, chunk);
                    }
                    return;
                }
                let chunks_per_block = n_chunks.div_ceil(workers);
                let op = &op;
                thread::scope(|scope| {
                    let handles: Vec<_> = data
                        .chunks_mut(chunks_per_block * chunk_len)
                        .enumerate()
                        .map(|(b, block)| {
                            scope.spawn(move || {
                                let first = b * chunks_per_block;
                                for (i, chunk) in block.chunks_mut(chunk_len).enumerate() {
                                    op(first + i, chunk);
                                }
                            })
                        })
                        .collect();
                    resume_first_panic(handles);
                });
            }
            #[cfg(feature = "rayon")]
            Self::Rayon => {
                use rayon::prelude::*;
                data.par_chunks_mut(chunk_len)
                    .enumerate()
                    .for_each(|(k, chunk)| op(k, chunk));
            }
        }
    }
}

fn scoped_join<F>(workers: usize, body: F)
where
    F: Fn(usize) + Sync,
{
    let body = &body;
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|w| scope.spawn(move || body(w)))
            .collect();
        resume_first_panic(handles);
    });
}

/// Joins every handle, then re-raises the first panic payload seen.
fn resume_first_panic(handles: Vec<thread::ScopedJoinHandle<'_, ()>>) {
    let mut first_panic = None;
    for handle in handles {
        if let Err(payload) = handle.join() {
            first_panic.get_or_insert(payload);
        }
    }
    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::Executor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backends() -> Vec<Executor> {
        let mut out = vec![Executor::Sequential, Executor::scoped(1), Executor::scoped(4)];
        #[cfg(feature = "rayon")]
        out.push(Executor::Rayon);
        out
    }

    #[test]
    fn parallel_for_visits_each_index_once() {
        for exec in backends() {
            for n in [0usize, 1, 3, 7, 64, 1000] {
                let hits: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
                exec.parallel_for(n, |i| {
                    hits[i].fetch_add(1, Ordering::Relaxed);
                });
                assert!(
                    hits.iter().all(|h| h.load(Ordering::Relaxed) == 1),
                    "{} n={n}",
                    exec.name()
                );
            }
        }
    }

    #[test]
    fn chunks_get_their_own_index() {
        for exec in backends() {
            let mut data = vec![0usize; 23];
            exec.for_each_chunk_mut(&mut data, 5, |k, chunk| {
                for v in chunk.iter_mut() {
                    *v = k;
                }
            });
            let expected: Vec<usize> = (0..23).map(|i| i / 5).collect();
            assert_eq!(data, expected, "{}", exec.name());
        }
    }

    #[test]
    fn panic_payload_reaches_caller() {
        for exec in backends() {
            let result = std::panic::catch_unwind(|| {
                exec.parallel_for(16, |i| {
                    if i == 11 {
                        panic!("index eleven");
                    }
                });
            });
            let payload = result.unwrap_err();
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or_default();
            assert_eq!(message, "index eleven", "{}", exec.name());
        }
    }

    #[test]
    fn scoped_zero_uses_available_parallelism() {
        match Executor::scoped(0) {
            Executor::Scoped { workers } => assert!(workers.get() >= 1),
            other => panic!("unexpected backend {other:?}"),
        }
    }
}

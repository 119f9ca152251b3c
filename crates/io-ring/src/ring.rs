//! [`IoRing`]: a bounded submission/completion ring over a [`StoragePool`].
//!
//! Real io_uring keeps a fixed-depth submission queue and a matching
//! completion queue serviced by the kernel; we model the same back-pressure
//! and buffer-pinning contract over `tokio`'s task scheduler, since nothing
//! in this workspace's dependency stack speaks the actual io_uring ABI.
//! Submission depth is enforced by a counting semaphore; each accepted
//! submission runs as a detached `tokio::spawn` task so dropping the
//! `Future` a caller is awaiting cancels only that caller's wait, never the
//! underlying read or write.

use crate::{
    buffer::{Buffer, BufferPool},
    config::IoRingConfig,
    errors::{IoError, IoResult},
};
use ferrochain_storage_pool::{ChunkId, StoragePool};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, trace};

/// A bounded async I/O ring over a [`StoragePool`].
///
/// Cloning an [`IoRing`] is cheap; clones share the same submission
/// semaphore, buffer pool and underlying pool.
#[derive(Clone)]
pub struct IoRing {
    pool: Arc<StoragePool>,
    buffers: BufferPool,
    submission: Arc<Semaphore>,
    config: IoRingConfig,
}

impl IoRing {
    /// Builds a ring over `pool` with `config`'s submission depth and buffer
    /// pool sizing.
    pub fn new(pool: Arc<StoragePool>, config: IoRingConfig) -> Self {
        let buffers = BufferPool::new(config.buffer_slots, config.buffer_size);
        let submission = Arc::new(Semaphore::new(config.submission_depth));
        Self { pool, buffers, submission, config }
    }

    /// Reads `page_count_hint` pages at `(chunk_id, byte_offset)`, returning
    /// a pinned buffer holding the result.
    ///
    /// Dropping the returned future before it resolves abandons the caller's
    /// wait; the read itself keeps running on its detached task and its
    /// result is discarded.
    pub async fn submit_read(
        &self,
        chunk_id: ChunkId,
        byte_offset: u64,
        page_count_hint: u16,
    ) -> IoResult<Buffer> {
        let _permit = self.acquire_submission_slot().await;
        let mut buffer = self.buffers.checkout().await;
        let pool = self.pool.clone();
        let page_count = page_count_hint as usize;

        let handle = tokio::spawn(async move {
            tokio::task::spawn_blocking(move || pool.read(chunk_id, byte_offset, page_count))
                .await
                .map_err(|_| IoError::WorkerPanicked)?
        });

        let bytes = self.await_completion(handle).await?;
        let copy_len = bytes.len().min(buffer.len());
        buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
        trace!(chunk_id, byte_offset, page_count, "completed io-ring read");
        Ok(buffer)
    }

    /// Writes `bytes` at `(chunk_id, byte_offset)`.
    ///
    /// As with [`Self::submit_read`], dropping the returned future only
    /// abandons the caller's wait; the write still lands.
    pub async fn submit_write(&self, chunk_id: ChunkId, byte_offset: u64, bytes: Vec<u8>) -> IoResult<()> {
        let _permit = self.acquire_submission_slot().await;
        let pool = self.pool.clone();

        let handle = tokio::spawn(async move {
            tokio::task::spawn_blocking(move || pool.write(chunk_id, byte_offset, &bytes))
                .await
                .map_err(|_| IoError::WorkerPanicked)?
        });

        self.await_completion(handle).await?;
        trace!(chunk_id, byte_offset, "completed io-ring write");
        Ok(())
    }

    /// Flushes the underlying pool. Any failure here is fatal and the
    /// process should abort rather than continue with a torn durability
    /// guarantee; callers that need that behavior should use
    /// [`Self::abort_on_fatal`].
    pub fn flush(&self) -> IoResult<()> {
        Ok(self.pool.flush()?)
    }

    /// Aborts the process on a fatal I/O error, logging first. A write that
    /// might have landed partially must never be silently treated as a
    /// transient failure.
    pub fn abort_on_fatal(err: &IoError) -> ! {
        error!(%err, "fatal storage I/O error, aborting");
        std::process::abort()
    }

    async fn acquire_submission_slot(&self) -> tokio::sync::OwnedSemaphorePermit {
        if let Ok(permit) = self.submission.clone().try_acquire_owned() {
            return permit;
        }
        if self.config.polling_mode {
            for _ in 0..self.config.poll_spin_cap {
                if let Ok(permit) = self.submission.clone().try_acquire_owned() {
                    return permit;
                }
                tokio::task::yield_now().await;
            }
        }
        self.submission.clone().acquire_owned().await.expect("io ring submission semaphore is never closed")
    }

    async fn await_completion<T>(&self, handle: tokio::task::JoinHandle<IoResult<T>>) -> IoResult<T> {
        if self.config.polling_mode {
            let mut handle = handle;
            for _ in 0..self.config.poll_spin_cap {
                match futures_now_or_never(&mut handle) {
                    Some(result) => return join_result(result),
                    None => tokio::task::yield_now().await,
                }
            }
            return join_result(handle.await);
        }
        join_result(handle.await)
    }
}

fn join_result<T>(result: Result<IoResult<T>, tokio::task::JoinError>) -> IoResult<T> {
    match result {
        Ok(inner) => inner,
        Err(join_err) => {
            error!(%join_err, "io-ring task panicked");
            Err(IoError::WorkerPanicked)
        }
    }
}

/// Polls `handle` exactly once without blocking, returning its output if it
/// was already ready. Used only in polling mode to spin briefly before
/// falling back to a real await.
fn futures_now_or_never<T>(
    handle: &mut tokio::task::JoinHandle<IoResult<T>>,
) -> Option<Result<IoResult<T>, tokio::task::JoinError>> {
    use std::future::Future;
    use std::task::{Context, Poll};
    let waker = futures_noop_waker();
    let mut cx = Context::from_waker(&waker);
    match std::pin::Pin::new(handle).poll(&mut cx) {
        Poll::Ready(output) => Some(output),
        Poll::Pending => None,
    }
}

fn futures_noop_waker() -> std::task::Waker {
    use std::task::{RawWaker, RawWakerVTable, Waker};
    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
    // SAFETY: the no-op vtable never dereferences the data pointer.
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_storage_pool::StorageConfig;
    use tempfile::tempdir;

    fn test_ring(polling: bool) -> (tempfile::TempDir, IoRing) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let storage_config = StorageConfig {
            file_paths: vec![path],
            chunk_size: 4096,
            chunks_per_file: 4,
            page_size: 4096,
            hugepages: false,
        };
        let pool = Arc::new(StoragePool::open(storage_config).unwrap());
        let ring_config = IoRingConfig { polling_mode: polling, submission_depth: 2, ..IoRingConfig::default() };
        (dir, IoRing::new(pool, ring_config))
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_the_ring() {
        let (_dir, ring) = test_ring(false);
        let chunk_id = ring.pool.allocate_chunk().unwrap();
        ring.submit_write(chunk_id, 0, vec![0xAB; 16]).await.unwrap();
        let buf = ring.submit_read(chunk_id, 0, 1).await.unwrap();
        assert_eq!(&buf[..16], &[0xAB; 16]);
    }

    #[tokio::test]
    async fn polling_mode_round_trips_identically() {
        let (_dir, ring) = test_ring(true);
        let chunk_id = ring.pool.allocate_chunk().unwrap();
        ring.submit_write(chunk_id, 0, vec![0x11; 8]).await.unwrap();
        let buf = ring.submit_read(chunk_id, 0, 1).await.unwrap();
        assert_eq!(&buf[..8], &[0x11; 8]);
    }

    #[tokio::test]
    async fn dropping_the_wait_does_not_cancel_the_write() {
        let (_dir, ring) = test_ring(false);
        let chunk_id = ring.pool.allocate_chunk().unwrap();
        {
            let fut = ring.submit_write(chunk_id, 0, vec![0x22; 8]);
            drop(fut);
        }
        // Give the detached task a chance to run, then confirm via a fresh
        // write/read that the ring is still usable (the spawned task from
        // the dropped future does not poison shared state).
        ring.submit_write(chunk_id, 0, vec![0x33; 8]).await.unwrap();
        let buf = ring.submit_read(chunk_id, 0, 1).await.unwrap();
        assert_eq!(&buf[..8], &[0x33; 8]);
    }
}

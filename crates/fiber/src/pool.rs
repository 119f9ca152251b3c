//! [`FiberPool`]: a fixed set of worker threads, each draining one shared
//! priority queue and one pinned local queue of cooperatively scheduled
//! fibers.
//!
//! A fiber is any `Future<Output = ()>`. It runs until it returns `Pending`
//! — having called [`yield_now`] or awaited something that genuinely
//! suspends it, such as an I/O ring completion — and is re-queued by its
//! own waker rather than polled again immediately. There is no preemption:
//! a fiber that never yields blocks its worker until it completes.

use crate::{
    config::PoolConfig,
    errors::{FiberError, FiberResult},
    queue::{Entry, FiberId, Placement, Priority, Queues},
    waker::FiberWaker,
};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll, Waker},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A fixed pool of cooperative fiber-scheduling worker threads, fed by one
/// shared priority queue and one submission channel.
pub struct FiberPool {
    queues: Arc<Queues>,
    submit: mpsc::Sender<Arc<Entry>>,
    next_id: AtomicU64,
    shutdown: Arc<AtomicBool>,
    dispatcher: Option<std::thread::JoinHandle<()>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl FiberPool {
    /// Starts `config.workers` worker threads and one dispatcher thread
    /// that drains the submission channel into the shared or pinned
    /// queues.
    pub fn new(config: PoolConfig) -> Self {
        let worker_count = config.workers.max(1);
        let queues = Queues::new(worker_count);
        let (submit_tx, submit_rx) = mpsc::channel(config.submission_capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));

        let dispatcher = {
            let queues = queues.clone();
            std::thread::Builder::new()
                .name("ferrochain-fiber-dispatch".into())
                .spawn(move || dispatcher_loop(queues, submit_rx))
                .expect("failed to spawn fiber dispatcher thread")
        };

        let workers = (0..worker_count)
            .map(|idx| {
                let queues = queues.clone();
                let shutdown = shutdown.clone();
                let idle_sleep = config.idle_sleep;
                std::thread::Builder::new()
                    .name(format!("ferrochain-fiber-{idx}"))
                    .spawn(move || worker_loop(idx, queues, shutdown, idle_sleep))
                    .expect("failed to spawn fiber worker thread")
            })
            .collect();

        Self { queues, submit: submit_tx, next_id: AtomicU64::new(0), shutdown, dispatcher: Some(dispatcher), workers }
    }

    /// Submits a new fiber at `priority`, to run wherever `placement` says.
    /// Awaits until the submission channel has room, backpressuring the
    /// caller once it is full.
    pub async fn spawn<F>(&self, priority: Priority, placement: Placement, fiber: F) -> FiberResult<FiberId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = FiberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let seq = self.queues.next_seq();
        let entry = Entry::new(id, priority, seq, placement, Box::pin(fiber));
        self.submit.send(entry).await.map_err(|_| FiberError::ShuttingDown)?;
        Ok(id)
    }

    /// Signals every worker to stop once its queues next run dry, closes
    /// the submission channel, and waits for the dispatcher and every
    /// worker to exit. Consumes the pool — further use is a compile error,
    /// not a runtime one.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        drop(self.submit);
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl std::fmt::Debug for FiberPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberPool").field("workers", &self.workers.len()).finish()
    }
}

fn dispatcher_loop(queues: Arc<Queues>, mut submit_rx: mpsc::Receiver<Arc<Entry>>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start fiber dispatcher runtime");
    rt.block_on(async move {
        while let Some(entry) = submit_rx.recv().await {
            trace!(id = %entry.id, "fiber admitted");
            queues.awaken(entry);
        }
    });
    debug!("fiber dispatcher stopped");
}

fn worker_loop(idx: usize, queues: Arc<Queues>, shutdown: Arc<AtomicBool>, idle_sleep: Duration) {
    let rt =
        tokio::runtime::Builder::new_current_thread().enable_all().build().expect("failed to start fiber worker runtime");
    rt.block_on(async move {
        loop {
            match queues.pick_next(idx) {
                Some(entry) => run_step(entry, &queues),
                None => {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    tokio::time::sleep(idle_sleep).await;
                }
            }
        }
    });
    debug!(worker = idx, "fiber worker stopped");
}

fn run_step(entry: Arc<Entry>, queues: &Arc<Queues>) {
    let Some(mut fiber) = entry.fiber.lock().take() else {
        // Woken while another worker still had it checked out; that worker
        // will observe the wake (it re-awakened this entry) once it puts
        // the future back, nothing to do here.
        return;
    };
    let waker = Waker::from(Arc::new(FiberWaker { entry: entry.clone(), queues: queues.clone() }));
    let mut cx = Context::from_waker(&waker);
    match fiber.as_mut().poll(&mut cx) {
        Poll::Ready(()) => trace!(id = %entry.id, "fiber completed"),
        Poll::Pending => *entry.fiber.lock() = Some(fiber),
    }
}

/// Yields the current fiber once, letting the scheduler run something else
/// (possibly higher priority, possibly on another worker) before resuming
/// it at its next scheduling opportunity.
pub async fn yield_now() {
    struct YieldNow(bool);
    impl Future for YieldNow {
        type Output = ();
        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
    YieldNow(false).await
}

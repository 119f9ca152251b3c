//! [`FiberWaker`]: re-enqueues a fiber into its queue when woken.

use crate::queue::{Entry, Queues};
use std::{sync::Arc, task::Wake};

pub(crate) struct FiberWaker {
    pub(crate) entry: Arc<Entry>,
    pub(crate) queues: Arc<Queues>,
}

impl Wake for FiberWaker {
    fn wake(self: Arc<Self>) {
        self.queues.awaken(self.entry.clone());
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queues.awaken(self.entry.clone());
    }
}

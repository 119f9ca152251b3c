//! Configuration for the [`crate::IoRing`].

/// Construction parameters for an [`crate::IoRing`].
#[derive(Debug, Clone)]
pub struct IoRingConfig {
    /// Maximum number of reads/writes in flight at once.
    pub submission_depth: usize,
    /// Size in bytes of one pre-pinned buffer slot. Must match the storage
    /// pool's page size times the largest single-node page count.
    pub buffer_size: usize,
    /// Number of pre-pinned buffer slots held by the [`crate::BufferPool`].
    pub buffer_slots: usize,
    /// Whether submission should spin rather than making a syscall, up to
    /// `poll_spin_cap` iterations before yielding.
    pub polling_mode: bool,
    /// The spin cap used in polling mode.
    pub poll_spin_cap: u32,
}

impl Default for IoRingConfig {
    fn default() -> Self {
        Self {
            submission_depth: 128,
            buffer_size: 4096,
            buffer_slots: 256,
            polling_mode: false,
            poll_spin_cap: 1_000,
        }
    }
}

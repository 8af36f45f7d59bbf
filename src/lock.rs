//! # Reader/writer coordination (C5, §4.5, §5)
//!
//! Single-writer/multi-reader, writer-preferring: once a writer is
//! waiting, new readers queue behind it rather than starving it out.
//! `parking_lot::RwLock` is already writer-preferring, so the coordinator
//! is a thin typed wrapper plus the fork-barrier hooks a host persistence
//! layer calls around a snapshotting fork.
//!
//! This module never calls `fork()` itself — it only exposes the three
//! hook points (`pre_fork`, `post_fork_parent`, `post_fork_child`) a host
//! invokes around its own fork, modeled on `RG_ForkPrepare` /
//! `RG_AfterForkParent` / `RG_AfterForkChild` in the retrieved original
//! source (`examples/original_source/src/module_event_handlers.c`).

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Coordinates access to a single graph's mutable state.
///
/// `T` is typically the graph's matrices/entity stores bundled behind one
/// lock, since §5 treats the whole graph as one critical section rather
/// than locking individual matrices.
pub struct RwCoordinator<T> {
    inner: RwLock<T>,
}

impl<T> RwCoordinator<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.inner.try_read()
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.inner.try_write()
    }

    /// Called by the host immediately before forking for a persistence
    /// snapshot. Takes the read lock and holds it across the fork — this
    /// blocks a concurrent writer from starting (and, being
    /// writer-preferring, is itself blocked behind one already waiting) so
    /// the child's copy-on-write page tables capture a quiescent,
    /// self-consistent state (§4.5: "it must acquire the read-lock on
    /// every graph"). The returned guard must be held by the host until
    /// the fork returns, then passed to `post_fork_parent`.
    pub fn pre_fork(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Called by the host in the parent process right after `fork()`
    /// returns. Dropping the passed-in guard releases the read lock taken
    /// by `pre_fork`.
    pub fn post_fork_parent(&self, guard: RwLockReadGuard<'_, T>) {
        drop(guard);
    }

    /// Called by the host in the child process right after `fork()`
    /// returns, before the child touches the graph. The child inherited
    /// the locked state via COW pages; since the child is single-
    /// threaded and only reads, the lock can simply be released without
    /// observing or mutating `T`.
    pub fn post_fork_child(&self, guard: RwLockReadGuard<'_, T>) {
        drop(guard);
    }
}

//! Frame - a slot in the buffer pool.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::Page;

/// A buffer pool slot holding at most one resident page.
///
/// The pool allocates its frames once and never moves them, so a `&Frame`
/// (and the page buffer behind it) stays valid for the pool's lifetime.
/// The page bytes sit behind the per-page reader/writer latch; the
/// resident id, pin count, and dirty flag are plain atomics whose
/// transitions the pool latch serializes. A frame cycles between two
/// states: detached (no page, no pins) and bound via
/// [`install`](Self::install), which hands the caller the first pin.
pub struct Frame {
    /// Page bytes behind the per-page latch.
    page: RwLock<Page>,

    /// Raw id of the resident page; `PageId::INVALID.0` while detached.
    page_id: AtomicU32,

    /// Outstanding references to the resident page.
    pin_count: AtomicU32,

    /// Set when the buffer has diverged from its on-disk image.
    is_dirty: AtomicBool,
}

impl Frame {
    /// A detached frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: AtomicU32::new(PageId::INVALID.0),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Latch the page for shared reads.
    #[inline]
    pub fn latch_read(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Latch the page exclusively.
    #[inline]
    pub fn latch_write(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Id of the resident page, `PageId::INVALID` while detached.
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Relaxed))
    }

    /// Whether no page is resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.page_id().is_valid()
    }

    /// Bind `page_id` to this frame, clean and carrying its first pin.
    ///
    /// The frame must be detached: no resident page, no outstanding pins.
    pub fn install(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
        self.pin_count.store(1, Ordering::Relaxed);
    }

    /// Take one more reference to the resident page.
    #[inline]
    pub fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Give back one reference. True when this was the last pin, i.e. the
    /// frame just became eviction-eligible.
    ///
    /// # Panics
    /// Panics when no pin is outstanding; the pool checks before calling.
    pub fn unpin(&self) -> bool {
        let before = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(before > 0, "unpin on frame with zero pins");
        before == 1
    }

    /// Current number of pins.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Whether any pin is outstanding.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Record that the buffer no longer matches disk.
    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    /// Record that the buffer was written back.
    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Whether the buffer has unwritten modifications.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Detach the frame: zero the buffer, drop the id, pins, and dirty
    /// flag.
    pub fn reset(&self) {
        self.latch_write().reset();
        self.page_id.store(PageId::INVALID.0, Ordering::Relaxed);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}

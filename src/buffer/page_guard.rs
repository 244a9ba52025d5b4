//! RAII guards for page access.
//!
//! Every guard owns one pin on its page and returns it on drop:
//! - [`PagePinGuard`] - pin only; latch the page explicitly as needed
//! - [`PageReadGuard`] - pin + read latch for the guard's lifetime
//! - [`PageWriteGuard`] - pin + write latch; the page is dirty on release
//!
//! Guards are move-only. On every exit path, including panics, a latching
//! guard releases the page latch before the pin goes back, so the pool
//! latch is never requested while a page latch is held.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::Page;

use super::buffer_pool_manager::BufferPoolManager;
use super::frame::Frame;

/// Pin-only guard over a fetched page.
///
/// Holds no latch of its own: [`read`](Self::read) and
/// [`write`](Self::write) take the page latch for the duration of the
/// returned borrow. Writing marks the guard dirty;
/// [`set_dirty`](Self::set_dirty) is there for callers that mutate through
/// other means. Dropping the guard unpins the page with the accumulated
/// dirty flag.
pub struct PagePinGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a Frame,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> PagePinGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a Frame, page_id: PageId) -> Self {
        Self {
            bpm,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Latch the page for reading.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.frame.latch_read()
    }

    /// Latch the page for writing and mark the guard dirty.
    #[inline]
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Page> {
        self.is_dirty = true;
        self.frame.latch_write()
    }

    /// Mark the guard dirty without taking the write latch.
    #[inline]
    pub fn set_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PagePinGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// Guard for shared read access to a page.
///
/// Multiple read guards can exist for the same page simultaneously.
/// Derefs to [`Page`]; unpins clean.
pub struct PageReadGuard<'a> {
    // Field order is load-bearing: fields drop in declaration order, so
    // the read latch is released before the pin is returned.
    lock: RwLockReadGuard<'a, Page>,
    pin: PagePinGuard<'a>,
}

impl<'a> PageReadGuard<'a> {
    /// Called by `BufferPoolManager::fetch_page_read` with a pinned frame.
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a Frame, page_id: PageId) -> Self {
        Self {
            lock: frame.latch_read(),
            pin: PagePinGuard::new(bpm, frame, page_id),
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id()
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one write guard can exist for a page at a time. Derefs to
/// [`Page`]; unpinning always marks the page dirty, on the assumption
/// that a writer wrote.
pub struct PageWriteGuard<'a> {
    // Same drop-order contract as PageReadGuard.
    lock: RwLockWriteGuard<'a, Page>,
    pin: PagePinGuard<'a>,
}

impl<'a> PageWriteGuard<'a> {
    /// Called by `BufferPoolManager::fetch_page_write` with a pinned frame.
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a Frame, page_id: PageId) -> Self {
        let mut pin = PagePinGuard::new(bpm, frame, page_id);
        pin.set_dirty();
        Self {
            lock: frame.latch_write(),
            pin,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id()
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

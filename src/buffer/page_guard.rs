use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::Frame;

/// Callback invoked when a guard is dropped: (page id, dirtied).
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// Shared guard plumbing: keeps the frame alive and fires the release
/// callback exactly once so every fetch is balanced by one unpin on every
/// control-flow exit.
struct GuardBase {
    page_id: PageId,
    _frame: Arc<Frame>,
    release: Option<ReleaseCallback>,
    dirtied: bool,
}

impl GuardBase {
    fn new(page_id: PageId, frame: Arc<Frame>, release: ReleaseCallback) -> Self {
        Self {
            page_id,
            _frame: frame,
            release: Some(release),
            dirtied: false,
        }
    }

    fn release(&mut self) {
        if let Some(callback) = self.release.take() {
            callback(self.page_id, self.dirtied);
        }
    }
}

/// RAII guard for read access to a pinned page. Unpins on drop.
pub struct ReadPageGuard {
    base: GuardBase,
    _data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives this guard; the `Arc` held
    /// in the base does exactly that.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>, release: ReleaseCallback) -> Self {
        let data_guard = frame.data.read();
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: GuardBase::new(page_id, frame, release),
            _data_guard: data_guard,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self._data_guard[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.base.release();
    }
}

/// RAII guard for write access to a pinned page. Accessing the bytes through
/// `data_mut` marks the page dirty; drop unpins and reports the dirty bit.
pub struct WritePageGuard {
    base: GuardBase,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// # Safety
    /// The caller must ensure the frame outlives this guard; the `Arc` held
    /// in the base does exactly that.
    pub(crate) unsafe fn new(page_id: PageId, frame: Arc<Frame>, release: ReleaseCallback) -> Self {
        let data_guard = frame.data.write();
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            base: GuardBase::new(page_id, frame, release),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.dirtied = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the data lock before the unpin callback runs.
        self.data_guard.take();
        self.base.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FrameId;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_read_guard_releases_on_drop() {
        let frame = Arc::new(Frame::new(FrameId::new(0)));
        frame.set_page_id(PageId::new(1));
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        frame.copy_from(&data);

        let released = Arc::new(AtomicBool::new(false));
        let released_clone = released.clone();

        let guard = unsafe {
            ReadPageGuard::new(
                PageId::new(1),
                frame.clone(),
                Box::new(move |_, _| released_clone.store(true, Ordering::SeqCst)),
            )
        };

        assert_eq!(guard.page_id(), PageId::new(1));
        assert_eq!(guard.data()[0], 42);
        assert!(!released.load(Ordering::SeqCst));

        drop(guard);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_write_guard_reports_dirty() {
        let frame = Arc::new(Frame::new(FrameId::new(0)));
        frame.set_page_id(PageId::new(1));

        let dirty = Arc::new(AtomicBool::new(false));
        let dirty_clone = dirty.clone();

        let mut guard = unsafe {
            WritePageGuard::new(
                PageId::new(1),
                frame.clone(),
                Box::new(move |_, is_dirty| dirty_clone.store(is_dirty, Ordering::SeqCst)),
            )
        };

        guard.data_mut()[0] = 42;
        drop(guard);

        assert!(dirty.load(Ordering::SeqCst));
        let mut readback = [0u8; PAGE_SIZE];
        frame.copy_to(&mut readback);
        assert_eq!(readback[0], 42);
    }

    #[test]
    fn test_write_guard_clean_when_untouched() {
        let frame = Arc::new(Frame::new(FrameId::new(0)));
        let dirty = Arc::new(AtomicBool::new(true));
        let dirty_clone = dirty.clone();

        let guard = unsafe {
            WritePageGuard::new(
                PageId::new(1),
                frame.clone(),
                Box::new(move |_, is_dirty| dirty_clone.store(is_dirty, Ordering::SeqCst)),
            )
        };
        drop(guard);

        assert!(!dirty.load(Ordering::SeqCst));
    }
}

//! Boundary to the system clipboard
//!
//! Native clipboard reads can pump the host toolkit's event loop, which may
//! call back into the provider before the first read returns. `GuardedProvider`
//! serializes access with a non-blocking busy flag: a nested read gets the
//! last cached value, a nested write or clear is dropped. Everything runs on
//! one thread, so the flag is a `Cell`, not a lock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace};

/// The native clipboard/selection
pub trait Provider {
    fn get_current(&self) -> Option<String>;

    fn set_current(&self, text: &str);

    fn clear(&self);

    /// False while the selection is still being made (e.g. mid-drag)
    fn is_ready(&self) -> bool {
        true
    }
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    fn get_current(&self) -> Option<String> {
        (**self).get_current()
    }

    fn set_current(&self, text: &str) {
        (**self).set_current(text)
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

impl<P: Provider + ?Sized> Provider for Rc<P> {
    fn get_current(&self) -> Option<String> {
        (**self).get_current()
    }

    fn set_current(&self, text: &str) {
        (**self).set_current(text)
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// RAII holder of the busy flag; released on drop, including during unwinding.
struct BusyGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub struct GuardedProvider<P: Provider> {
    inner: P,
    busy: Cell<bool>,
    cached: RefCell<Option<String>>,
    owner_lost: Cell<bool>,
}

impl<P: Provider> GuardedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            busy: Cell::new(false),
            cached: RefCell::new(None),
            owner_lost: Cell::new(false),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Last value read from or written to the native clipboard
    pub fn cached(&self) -> Option<String> {
        self.cached.borrow().clone()
    }

    /// The selection owner went away. The next `None` read is treated as
    /// stale and answered with the cached value.
    pub fn owner_changed(&self) {
        debug!("clipboard owner destroyed; ignoring next empty read");
        self.owner_lost.set(true);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    pub fn get_current(&self) -> Option<String> {
        let read = {
            let Some(_guard) = BusyGuard::acquire(&self.busy) else {
                trace!("nested clipboard read; answering from cache");
                return self.cached();
            };
            self.inner.get_current()
        };

        if self.owner_lost.replace(false) && read.is_none() {
            debug!("empty read after owner change; reverting to cached value");
            return self.cached();
        }
        self.cached.replace(read.clone());
        read
    }

    /// Write `text` to the native clipboard unless it already holds exactly
    /// that text. Rewriting an X11 selection with the same string drops its
    /// highlight.
    pub fn set_current(&self, text: &str) {
        {
            let Some(_guard) = BusyGuard::acquire(&self.busy) else {
                trace!("nested clipboard write dropped");
                return;
            };
            if self.inner.get_current().as_deref() != Some(text) {
                self.inner.set_current(text);
            }
        }
        self.cached.replace(Some(text.to_string()));
    }

    pub fn clear(&self) {
        {
            let Some(_guard) = BusyGuard::acquire(&self.busy) else {
                trace!("nested clipboard clear dropped");
                return;
            };
            self.inner.clear();
        }
        self.cached.replace(None);
    }
}

/// In-process clipboard, used headless and in tests
#[derive(Debug)]
pub struct MemoryProvider {
    contents: RefCell<Option<String>>,
    ready: Cell<bool>,
    writes: Cell<usize>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self {
            contents: RefCell::new(None),
            ready: Cell::new(true),
            writes: Cell::new(0),
        }
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate another application taking the clipboard
    pub fn put(&self, text: Option<&str>) {
        self.contents.replace(text.map(str::to_string));
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }

    /// Number of writes made through `set_current`/`clear`
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl Provider for MemoryProvider {
    fn get_current(&self) -> Option<String> {
        self.contents()
    }

    fn set_current(&self, text: &str) {
        self.writes.set(self.writes.get() + 1);
        self.contents.replace(Some(text.to_string()));
    }

    fn clear(&self) {
        self.writes.set(self.writes.get() + 1);
        self.contents.replace(None);
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }
}

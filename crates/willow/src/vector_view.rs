//! Resizable, rebasable vector indirection
//!
//! Compiled expressions reference vectors through a [`VectorView`]
//! handle, never through a captured (buffer, length) pair. The host can
//! therefore [`rebase`](VectorView::rebase) the backing storage or
//! [`set_size`](VectorView::set_size) the logical length between
//! evaluations and every expression compiled against the view observes
//! the change without recompilation.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct ViewData {
    data: Vec<f64>,
    size: usize,
}

/// Shared handle to a contiguous numeric buffer with independent
/// logical and base (allocated) sizes.
///
/// Invariant: `size() <= base_size()` always. Cloning the handle shares
/// the storage; a single view may back names in several symbol tables
/// and be shared by multiple expressions.
#[derive(Debug, Clone)]
pub struct VectorView {
    inner: Rc<RefCell<ViewData>>,
}

impl VectorView {
    /// Create a view over `data`, with logical size equal to its length.
    pub fn new(data: Vec<f64>) -> Self {
        let size = data.len();
        Self {
            inner: Rc::new(RefCell::new(ViewData { data, size })),
        }
    }

    /// Create a zero-filled view of the given size.
    pub fn zeroed(size: usize) -> Self {
        Self::new(vec![0.0; size])
    }

    /// Current logical size.
    pub fn size(&self) -> usize {
        self.inner.borrow().size
    }

    /// Allocated (base) size of the backing buffer.
    pub fn base_size(&self) -> usize {
        self.inner.borrow().data.len()
    }

    /// Change the logical size. Fails, leaving the view unchanged, if
    /// `new_size` exceeds the base size.
    pub fn set_size(&self, new_size: usize) -> bool {
        let mut inner = self.inner.borrow_mut();
        if new_size > inner.data.len() {
            return false;
        }
        inner.size = new_size;
        true
    }

    /// Replace the backing buffer. The logical size is preserved when
    /// it still fits, otherwise clamped to the new base size.
    pub fn rebase(&self, data: Vec<f64>) {
        let mut inner = self.inner.borrow_mut();
        inner.size = inner.size.min(data.len());
        inner.data = data;
    }

    /// Element at `index`, or `None` when out of the logical range.
    pub fn get(&self, index: usize) -> Option<f64> {
        let inner = self.inner.borrow();
        if index < inner.size {
            Some(inner.data[index])
        } else {
            None
        }
    }

    /// Store `value` at `index`. Returns `false` when out of the
    /// logical range.
    pub fn set(&self, index: usize, value: f64) -> bool {
        let mut inner = self.inner.borrow_mut();
        if index < inner.size {
            inner.data[index] = value;
            true
        } else {
            false
        }
    }

    /// Copy of the logical contents.
    pub fn to_vec(&self) -> Vec<f64> {
        let inner = self.inner.borrow();
        inner.data[..inner.size].to_vec()
    }

    /// Overwrite every element in the logical range with `value`.
    pub fn fill(&self, value: f64) {
        let mut inner = self.inner.borrow_mut();
        let size = inner.size;
        for slot in &mut inner.data[..size] {
            *slot = value;
        }
    }

    /// Copy `values` into the logical range, truncating to whichever
    /// side is shorter.
    pub fn copy_from(&self, values: &[f64]) {
        let mut inner = self.inner.borrow_mut();
        let n = inner.size.min(values.len());
        inner.data[..n].copy_from_slice(&values[..n]);
    }

    /// Two views are the same when they share storage.
    pub fn same_storage(&self, other: &VectorView) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Build a view over host data.
pub fn make_vector_view(data: Vec<f64>) -> VectorView {
    VectorView::new(data)
}

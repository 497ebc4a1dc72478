use std::alloc::Layout;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut, Range};
use std::ptr::NonNull;
use std::{cmp, fmt, mem, ptr};

use crate::alloc::{default_allocator, AllocRef};
use crate::error::Errc;
use crate::value::Value;

/// Header of a heap-backed array. `capacity` element slots trail the
/// header; slots `[0, size)` are initialized.
#[repr(C)]
struct RawArray {
    size: usize,
    capacity: usize,
}

/// A contiguous growable sequence of [`Value`]s.
///
/// The handle is one (nullable) pointer plus the allocator reference; an
/// array without capacity owns no allocation.
pub struct Array<'alloc> {
    raw: Option<NonNull<RawArray>>,
    alloc: AllocRef<'alloc>,
    _marker: PhantomData<Value<'alloc>>,
}

unsafe impl Send for Array<'_> {}
unsafe impl Sync for Array<'_> {}

// Element storage begins at the header size rounded up to Value alignment.
const fn data_offset() -> usize {
    let align = mem::align_of::<Value<'static>>();
    (mem::size_of::<RawArray>() + align - 1) & !(align - 1)
}

impl<'alloc> Array<'alloc> {
    /// An empty array. Does not allocate.
    pub fn new_in(alloc: AllocRef<'alloc>) -> Self {
        Self {
            raw: None,
            alloc,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity_in(capacity: usize, alloc: AllocRef<'alloc>) -> Result<Self, Errc> {
        let mut array = Self::new_in(alloc);
        array.reserve(capacity)?;
        Ok(array)
    }

    pub fn allocator(&self) -> AllocRef<'alloc> {
        self.alloc
    }

    #[inline]
    fn dims(&self) -> (usize, usize) {
        match self.raw {
            Some(raw) => unsafe {
                let header = raw.as_ref();
                (header.size, header.capacity)
            },
            None => (0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.dims().0
    }

    pub fn capacity(&self) -> usize {
        self.dims().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    unsafe fn data_of(raw: NonNull<RawArray>) -> *mut Value<'alloc> {
        (raw.as_ptr() as *mut u8).add(data_offset()) as *mut Value<'alloc>
    }

    pub fn as_slice(&self) -> &[Value<'alloc>] {
        match self.raw {
            Some(raw) => unsafe {
                std::slice::from_raw_parts(Self::data_of(raw), raw.as_ref().size)
            },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value<'alloc>] {
        match self.raw {
            Some(raw) => unsafe {
                std::slice::from_raw_parts_mut(Self::data_of(raw), raw.as_ref().size)
            },
            None => &mut [],
        }
    }

    fn layout_for(capacity: usize) -> Result<Layout, Errc> {
        let bytes = capacity
            .checked_mul(mem::size_of::<Value>())
            .and_then(|bytes| bytes.checked_add(data_offset()))
            .ok_or(Errc::NotEnoughMemory)?;
        let align = cmp::max(mem::align_of::<RawArray>(), mem::align_of::<Value>());
        Layout::from_size_align(bytes, align).map_err(|_| Errc::NotEnoughMemory)
    }

    fn allocate_raw(
        size: usize,
        capacity: usize,
        alloc: AllocRef<'alloc>,
    ) -> Result<NonNull<RawArray>, Errc> {
        let layout = Self::layout_for(capacity)?;
        let block = alloc.allocate(layout).map_err(|_| Errc::NotEnoughMemory)?;
        let raw = block.cast::<RawArray>();
        unsafe {
            raw.as_ptr().write(RawArray { size, capacity });
        }
        Ok(raw)
    }

    /// Frees a block whose elements have already been moved or dropped.
    unsafe fn release(raw: NonNull<RawArray>, alloc: AllocRef<'_>) {
        let capacity = raw.as_ref().capacity;
        // The layout was validated when the block was allocated.
        let layout = Layout::from_size_align_unchecked(
            data_offset() + capacity * mem::size_of::<Value>(),
            cmp::max(mem::align_of::<RawArray>(), mem::align_of::<Value>()),
        );
        alloc.deallocate(raw.cast(), layout);
    }

    /// Ensures capacity for at least `capacity` elements, with the same
    /// growth policy as [`Str::reserve`](crate::Str::reserve). On failure
    /// the array is unchanged.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), Errc> {
        let (size, current) = self.dims();
        if capacity <= current {
            return Ok(());
        }
        let new_capacity = if current == 0 {
            capacity
        } else {
            cmp::max(capacity, current.saturating_mul(2))
        };

        let raw = Self::allocate_raw(size, new_capacity, self.alloc)?;
        if let Some(old) = self.raw {
            unsafe {
                ptr::copy_nonoverlapping(Self::data_of(old), Self::data_of(raw), size);
                Self::release(old, self.alloc);
            }
        }
        self.raw = Some(raw);
        Ok(())
    }

    pub fn push(&mut self, value: Value<'alloc>) -> Result<(), Errc> {
        let size = self.len();
        self.reserve(size + 1)?;
        unsafe {
            let raw = self.raw.expect("reserve produced capacity");
            Self::data_of(raw).add(size).write(value);
            (*raw.as_ptr()).size = size + 1;
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Value<'alloc>> {
        let raw = self.raw?;
        unsafe {
            let size = raw.as_ref().size;
            if size == 0 {
                return None;
            }
            (*raw.as_ptr()).size = size - 1;
            Some(Self::data_of(raw).add(size - 1).read())
        }
    }

    /// Inserts `value` at `index`, shifting later elements up.
    ///
    /// Panics when `index > len`.
    pub fn insert(&mut self, index: usize, value: Value<'alloc>) -> Result<(), Errc> {
        let size = self.len();
        assert!(
            index <= size,
            "insertion index (is {index}) should be <= len (is {size})"
        );
        self.reserve(size + 1)?;
        unsafe {
            let raw = self.raw.expect("reserve produced capacity");
            let slot = Self::data_of(raw).add(index);
            ptr::copy(slot, slot.add(1), size - index);
            slot.write(value);
            (*raw.as_ptr()).size = size + 1;
        }
        Ok(())
    }

    /// Removes and returns the element at `index`, shifting later elements
    /// down.
    ///
    /// Panics when `index >= len`.
    pub fn remove(&mut self, index: usize) -> Value<'alloc> {
        let size = self.len();
        assert!(
            index < size,
            "removal index (is {index}) should be < len (is {size})"
        );
        unsafe {
            let raw = self.raw.expect("non-empty array has storage");
            let slot = Self::data_of(raw).add(index);
            let value = slot.read();
            ptr::copy(slot.add(1), slot, size - index - 1);
            (*raw.as_ptr()).size = size - 1;
            value
        }
    }

    /// Drops the elements in `range`, shifting later elements down.
    ///
    /// Panics when the range is out of bounds.
    pub fn erase(&mut self, range: Range<usize>) {
        let size = self.len();
        assert!(
            range.start <= range.end && range.end <= size,
            "erase range {range:?} out of bounds for len {size}"
        );
        let count = range.end - range.start;
        if count == 0 {
            return;
        }
        unsafe {
            let raw = self.raw.expect("non-empty array has storage");
            let data = Self::data_of(raw);
            for index in range.clone() {
                ptr::drop_in_place(data.add(index));
            }
            ptr::copy(data.add(range.end), data.add(range.start), size - range.end);
            (*raw.as_ptr()).size = size - count;
        }
    }

    /// Drops all elements. Retains capacity.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    pub fn truncate(&mut self, new_len: usize) {
        let Some(raw) = self.raw else { return };
        unsafe {
            let size = raw.as_ref().size;
            if new_len >= size {
                return;
            }
            let data = Self::data_of(raw);
            for index in new_len..size {
                ptr::drop_in_place(data.add(index));
            }
            (*raw.as_ptr()).size = new_len;
        }
    }

    /// Grows or shrinks to `new_len` elements, filling any extension with
    /// deep copies of `fill`. On failure the array is unchanged.
    pub fn resize(&mut self, new_len: usize, fill: &Value<'alloc>) -> Result<(), Errc> {
        let size = self.len();
        if new_len <= size {
            self.truncate(new_len);
            return Ok(());
        }
        self.reserve(new_len)?;
        for _ in size..new_len {
            let copy = match fill.try_clone_in(self.alloc) {
                Ok(copy) => copy,
                Err(errc) => {
                    self.truncate(size);
                    return Err(errc);
                }
            };
            // Capacity is reserved; push cannot fail.
            self.push(copy)?;
        }
        Ok(())
    }

    /// Releases excess capacity. An empty array returns to owning nothing.
    pub fn shrink_to_fit(&mut self) -> Result<(), Errc> {
        let (size, capacity) = self.dims();
        if size == capacity {
            return Ok(());
        }
        let Some(old) = self.raw else { return Ok(()) };
        if size == 0 {
            unsafe { Self::release(old, self.alloc) };
            self.raw = None;
            return Ok(());
        }

        let raw = Self::allocate_raw(size, size, self.alloc)?;
        unsafe {
            ptr::copy_nonoverlapping(Self::data_of(old), Self::data_of(raw), size);
            Self::release(old, self.alloc);
        }
        self.raw = Some(raw);
        Ok(())
    }

    /// Deep copy with the given allocator.
    pub fn try_clone_in<'to>(&self, alloc: AllocRef<'to>) -> Result<Array<'to>, Errc> {
        let mut array = Array::with_capacity_in(self.len(), alloc)?;
        for value in self.as_slice() {
            array.push(value.try_clone_in(alloc)?)?;
        }
        Ok(array)
    }

    /// Moves this array to `alloc`. When the allocators are equal the
    /// backing storage is transferred as-is; otherwise this falls back to a
    /// deep copy and releases the original.
    pub fn relocate<'to>(self, alloc: AllocRef<'to>) -> Result<Array<'to>, Errc>
    where
        'alloc: 'to,
    {
        if alloc.is_equal(self.alloc) {
            let raw = self.raw;
            mem::forget(self);
            Ok(Array {
                raw,
                alloc,
                _marker: PhantomData,
            })
        } else {
            self.try_clone_in(alloc)
        }
    }

    /// Exchanges contents with `other`.
    ///
    /// Panics when the allocators are not equal.
    pub fn swap(&mut self, other: &mut Array<'alloc>) {
        assert!(
            self.alloc.is_equal(other.alloc),
            "swap requires equal allocators"
        );
        mem::swap(&mut self.raw, &mut other.raw);
    }
}

impl Array<'static> {
    /// An empty array using the process-wide default allocator.
    pub fn new() -> Self {
        Self::new_in(default_allocator())
    }
}

impl Default for Array<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Array<'_> {
    fn drop(&mut self) {
        self.clear();
        if let Some(raw) = self.raw {
            unsafe { Self::release(raw, self.alloc) };
        }
    }
}

impl<'alloc> Deref for Array<'alloc> {
    type Target = [Value<'alloc>];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<'alloc> DerefMut for Array<'alloc> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_slice().fmt(f)
    }
}

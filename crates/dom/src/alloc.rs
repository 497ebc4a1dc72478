use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Returned when an allocator cannot satisfy a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("allocation failed")]
pub struct AllocError;

/// Token identifying the pool an allocator draws from. Two allocators
/// reporting the same id may free each other's allocations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocatorId(usize);

impl AllocatorId {
    /// Identity tied to a single allocator instance.
    pub fn of_instance<T>(instance: &T) -> Self {
        Self(instance as *const T as usize)
    }

    /// Identity shared by every allocator of one interchangeable class,
    /// keyed on a static marker.
    pub fn of_class(marker: &'static u8) -> Self {
        Self(marker as *const u8 as usize)
    }
}

/// A memory allocation capability. Every container records the allocator it
/// was constructed with; the allocator must outlive the container.
pub trait Allocator: Send + Sync {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// # Safety
    /// `ptr` must denote a live block obtained from `allocate` on an equal
    /// allocator with this exact `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    fn id(&self) -> AllocatorId;

    fn is_equal(&self, other: &dyn Allocator) -> bool {
        self.id() == other.id()
    }
}

/// A shared reference to an allocator, as carried by every container.
pub type AllocRef<'alloc> = &'alloc (dyn Allocator + 'alloc);

/// An allocator that fails every request. Useful for containers that must
/// never allocate, and for exercising out-of-memory paths.
pub struct NullAllocator {
    _private: (),
}

static NULL_POOL: u8 = 0;

impl Allocator for NullAllocator {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    fn id(&self) -> AllocatorId {
        AllocatorId::of_class(&NULL_POOL)
    }
}

static NULL: NullAllocator = NullAllocator { _private: () };

pub fn null_allocator() -> &'static NullAllocator {
    &NULL
}

/// The process heap. All system allocators are interchangeable.
pub struct SystemAllocator {
    _private: (),
}

static SYSTEM_POOL: u8 = 0;

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // A dangling, well-aligned pointer stands in for zero-size blocks.
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }
        NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }

    fn id(&self) -> AllocatorId {
        AllocatorId::of_class(&SYSTEM_POOL)
    }
}

static SYSTEM: SystemAllocator = SystemAllocator { _private: () };

pub fn system_allocator() -> &'static SystemAllocator {
    &SYSTEM
}

// The process-wide default allocator is a single atomic slot. A fat `&dyn`
// reference does not fit an atomic, so the slot holds a thin pointer to a
// cell containing one; null means the slot was never replaced and the system
// allocator applies.
struct DefaultCell {
    alloc: &'static dyn Allocator,
}

static DEFAULT: AtomicPtr<DefaultCell> = AtomicPtr::new(std::ptr::null_mut());

/// The current process-wide default allocator.
pub fn default_allocator() -> &'static dyn Allocator {
    let cell = DEFAULT.load(Ordering::SeqCst);
    if cell.is_null() {
        &SYSTEM
    } else {
        // Cells are leaked on installation and never freed, so a loaded
        // pointer remains valid even across concurrent swaps.
        unsafe { (*cell).alloc }
    }
}

/// Install `alloc` as the process-wide default, returning the previous
/// default so callers may restore it. Each installation leaks one
/// pointer-sized cell, keeping references loaded by other threads valid.
pub fn set_default_allocator(alloc: &'static dyn Allocator) -> &'static dyn Allocator {
    let cell = Box::leak(Box::new(DefaultCell { alloc }));
    let prev = DEFAULT.swap(cell, Ordering::SeqCst);
    if prev.is_null() {
        &SYSTEM
    } else {
        unsafe { (*prev).alloc }
    }
}

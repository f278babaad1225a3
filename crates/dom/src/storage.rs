use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

/// MemoryResource is the byte-allocation seam beneath every container of
/// the document model. Implementations hand out raw, suitably aligned
/// memory; they are never asked to construct or destroy values.
///
/// A resource reporting `needs_free() == false` promises that individual
/// deallocations are unnecessary (its memory is reclaimed wholesale, as an
/// arena does), which lets containers skip their recursive teardown walk.
pub trait MemoryResource {
    /// Allocate `layout.size()` bytes at `layout.align()` alignment.
    /// Allocation failure aborts via `handle_alloc_error`, as the global
    /// allocator does.
    fn allocate(&self, layout: Layout) -> NonNull<u8>;

    /// Release an allocation previously obtained from this resource with
    /// this exact layout.
    ///
    /// # Safety
    /// `ptr` must originate from `allocate` on this same resource, with
    /// the same `layout`, and must not be released twice.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Whether allocations must be individually returned via `deallocate`.
    fn needs_free(&self) -> bool {
        true
    }
}

/// Storage is a cheap, copyable handle to a [`MemoryResource`], carried by
/// every container and propagated to everything they own. Two handles are
/// equal exactly when they refer to the same resource instance.
#[derive(Copy, Clone)]
pub struct Storage<'s> {
    res: &'s dyn MemoryResource,
}

impl<'s> Storage<'s> {
    pub fn new(res: &'s dyn MemoryResource) -> Self {
        Self { res }
    }

    /// The process-wide default resource, backed by the global allocator.
    pub fn global() -> Storage<'static> {
        Storage { res: &GLOBAL }
    }

    #[inline]
    pub fn allocate(&self, layout: Layout) -> NonNull<u8> {
        self.res.allocate(layout)
    }

    /// # Safety
    /// As [`MemoryResource::deallocate`].
    #[inline]
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.res.deallocate(ptr, layout)
    }

    #[inline]
    pub fn needs_free(&self) -> bool {
        self.res.needs_free()
    }

    #[inline]
    fn addr(&self) -> *const u8 {
        self.res as *const dyn MemoryResource as *const u8
    }
}

impl<'s> PartialEq for Storage<'s> {
    fn eq(&self, other: &Self) -> bool {
        // Identity, not structural, equality.
        self.addr() == other.addr()
    }
}
impl<'s> Eq for Storage<'s> {}

impl Default for Storage<'static> {
    fn default() -> Self {
        Storage::global()
    }
}

impl<'s, R: MemoryResource> From<&'s R> for Storage<'s> {
    fn from(res: &'s R) -> Self {
        Storage { res }
    }
}

impl<'s> fmt::Debug for Storage<'s> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Storage").field(&self.addr()).finish()
    }
}

/// Global delegates to the std allocator and requires explicit frees.
#[derive(Debug, Default)]
pub struct Global;

static GLOBAL: Global = Global;

impl MemoryResource for Global {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            // Like `std`, treat a zero-size request as a dangling pointer.
            return NonNull::new(layout.align() as *mut u8).unwrap();
        }
        // Safety: size is non-zero and `layout` is well-formed.
        match NonNull::new(unsafe { std::alloc::alloc(layout) }) {
            Some(ptr) => ptr,
            None => std::alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout)
        }
    }
}

// Chunks are released in one pass when the arena drops, so individual
// deallocations are no-ops and alignment slack is never reclaimed.
#[derive(Copy, Clone)]
struct Chunk {
    prev: Option<NonNull<Chunk>>,
    layout: Layout,
    used: usize,
}

const CHUNK_ALIGN: usize = 16;
const FIRST_CHUNK: usize = 4096;
const MAX_CHUNK: usize = 1 << 21;

/// Monotonic is a chunked bump arena: allocations only ever advance a
/// cursor, `deallocate` is a no-op, and the whole backing memory is
/// released when the arena drops. Containers backed by it report
/// `needs_free() == false` and elide their destruction walks.
pub struct Monotonic {
    head: Cell<Option<NonNull<Chunk>>>,
    next_size: Cell<usize>,
    allocated: Cell<usize>,
}

impl Monotonic {
    pub fn new() -> Self {
        Self::with_chunk_size(FIRST_CHUNK)
    }

    /// An arena whose first chunk holds about `size` bytes. Later chunks
    /// double, up to a fixed ceiling.
    pub fn with_chunk_size(size: usize) -> Self {
        Self {
            head: Cell::new(None),
            next_size: Cell::new(size.max(std::mem::size_of::<Chunk>() * 4)),
            allocated: Cell::new(0),
        }
    }

    /// Total bytes of backing memory currently held.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.get()
    }

    fn grow(&self, layout: Layout) -> NonNull<Chunk> {
        let need = std::mem::size_of::<Chunk>() + layout.size() + layout.align();
        let size = self.next_size.get().max(need);
        self.next_size.set((size * 2).min(MAX_CHUNK));

        let chunk_layout =
            Layout::from_size_align(size, CHUNK_ALIGN.max(layout.align())).expect("chunk layout");
        let base = GLOBAL.allocate(chunk_layout).cast::<Chunk>();
        // Safety: the allocation is large enough for the header and aligned
        // for it.
        unsafe {
            base.as_ptr().write(Chunk {
                prev: self.head.get(),
                layout: chunk_layout,
                used: std::mem::size_of::<Chunk>(),
            });
        }
        self.allocated.set(self.allocated.get() + size);
        tracing::trace!(
            chunk_bytes = size,
            total_bytes = self.allocated.get(),
            "monotonic storage adds a chunk"
        );
        self.head.set(Some(base));
        base
    }
}

impl Default for Monotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResource for Monotonic {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        // Safety: `head` is either None or points at a live chunk header.
        unsafe {
            if let Some(chunk) = self.head.get() {
                let header = chunk.as_ref();
                let base = chunk.as_ptr() as usize;
                let offset = (base + header.used + layout.align() - 1) & !(layout.align() - 1);
                if offset + layout.size() <= base + header.layout.size() {
                    return self.allocate_in(chunk, layout);
                }
            }
            let chunk = self.grow(layout);
            self.allocate_in(chunk, layout)
        }
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    fn needs_free(&self) -> bool {
        false
    }
}

impl Monotonic {
    // Bump within a chunk known to have room for `layout`.
    unsafe fn allocate_in(&self, mut chunk: NonNull<Chunk>, layout: Layout) -> NonNull<u8> {
        let header = chunk.as_ref();
        let base = chunk.as_ptr() as usize;
        let offset = (base + header.used + layout.align() - 1) & !(layout.align() - 1);
        debug_assert!(offset + layout.size() <= base + header.layout.size());
        chunk.as_mut().used = offset + layout.size() - base;
        NonNull::new_unchecked(offset as *mut u8)
    }
}

impl Drop for Monotonic {
    fn drop(&mut self) {
        let mut next = self.head.get();
        while let Some(chunk) = next {
            // Safety: each chunk was allocated by `grow` with this layout.
            unsafe {
                let Chunk { prev, layout, .. } = *chunk.as_ref();
                GLOBAL.deallocate(chunk.cast(), layout);
                next = prev;
            }
        }
    }
}

impl fmt::Debug for Monotonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monotonic")
            .field("allocated_bytes", &self.allocated.get())
            .finish()
    }
}

use std::any::Any;
use std::ptr::NonNull;

use tracing::{error, trace, warn};

use crate::backend::{ArrayAlloc, Backend};
use crate::chunk::{ChunkClass, MAX_CHUNK_ALIGN};
use crate::dispatch::{dispatch, ClassVisitor};
use crate::error::AllocError;
use crate::resource::{natural_alignment, resolve_alignment, MemoryResource, DEFAULT_MAX_ALIGN};

/// Exposes a rebindable block allocator as a [`MemoryResource`].
///
/// Each `(bytes, alignment)` request is resolved to a power-of-two alignment
/// no larger than `MAX_ALIGN`, then served as `ceil(bytes / alignment)`
/// chunks from the backend rebound to the matching chunk class. The adaptor
/// owns its backend by value; cloning the adaptor clones the backend.
///
/// # Examples
///
/// ```rust
/// use memres::{AllocError, MemoryResource, ResourceAdaptor, SystemAlloc};
///
/// let resource: ResourceAdaptor<SystemAlloc, 64> = ResourceAdaptor::default();
///
/// let block = resource.allocate(100, 32).unwrap();
/// assert_eq!(block.as_ptr() as usize % 32, 0);
/// unsafe { resource.deallocate(block, 100, 32) };
///
/// assert_eq!(
///     resource.allocate(5, 128),
///     Err(AllocError::UnsupportedAlignment { alignment: 128, max: 64 })
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAdaptor<A, const MAX_ALIGN: usize = DEFAULT_MAX_ALIGN> {
    backend: A,
}

impl<A: Backend, const MAX_ALIGN: usize> ResourceAdaptor<A, MAX_ALIGN> {
    const VALID_MAX_ALIGN: () = assert!(
        MAX_ALIGN.is_power_of_two() && MAX_ALIGN <= MAX_CHUNK_ALIGN,
        "MAX_ALIGN must be a power of 2 no larger than the largest chunk class"
    );

    pub fn new(backend: A) -> Self {
        let () = Self::VALID_MAX_ALIGN;
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn into_backend(self) -> A {
        self.backend
    }

    pub const fn max_alignment(&self) -> usize {
        MAX_ALIGN
    }
}

impl<A: Backend + Default, const MAX_ALIGN: usize> Default for ResourceAdaptor<A, MAX_ALIGN> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: Backend, const MAX_ALIGN: usize> From<A> for ResourceAdaptor<A, MAX_ALIGN> {
    fn from(backend: A) -> Self {
        Self::new(backend)
    }
}

struct AllocateChunks<'a, A, const MAX_ALIGN: usize> {
    backend: &'a A,
    chunks: usize,
}

impl<A: Backend, const MAX_ALIGN: usize> ClassVisitor for AllocateChunks<'_, A, MAX_ALIGN> {
    type Output = Result<NonNull<u8>, AllocError>;

    fn visit<C: ChunkClass>(self) -> Self::Output {
        // Classes above the limit are never reached; the branch folds away.
        if C::ALIGN > MAX_ALIGN {
            return Err(AllocError::UnsupportedAlignment {
                alignment: C::ALIGN,
                max: MAX_ALIGN,
            });
        }
        self.backend
            .rebind::<C>()
            .allocate(self.chunks)
            .map(NonNull::cast)
    }
}

struct DeallocateChunks<'a, A, const MAX_ALIGN: usize> {
    backend: &'a A,
    ptr: NonNull<u8>,
    chunks: usize,
}

impl<A: Backend, const MAX_ALIGN: usize> ClassVisitor for DeallocateChunks<'_, A, MAX_ALIGN> {
    type Output = ();

    fn visit<C: ChunkClass>(self) {
        if C::ALIGN > MAX_ALIGN {
            return;
        }
        // SAFETY: only built by `ResourceAdaptor::deallocate`, whose caller
        // guarantees `ptr` came from `allocate` with the same request, which
        // routed to this class with this chunk count.
        unsafe {
            self.backend
                .rebind::<C>()
                .deallocate(self.ptr.cast::<C>(), self.chunks)
        }
    }
}

impl<A: Backend, const MAX_ALIGN: usize> MemoryResource for ResourceAdaptor<A, MAX_ALIGN> {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<NonNull<u8>, AllocError> {
        let requested = alignment;
        let alignment = resolve_alignment(bytes, alignment, MAX_ALIGN).inspect_err(|err| {
            warn!(bytes, alignment = requested, max = MAX_ALIGN, "{err}");
        })?;

        let chunks = bytes.div_ceil(alignment);
        trace!(bytes, alignment, chunks, "allocate");

        let visitor = AllocateChunks::<A, MAX_ALIGN> {
            backend: &self.backend,
            chunks,
        };
        dispatch(alignment, visitor).unwrap_or(Err(AllocError::UnsupportedAlignment {
            alignment,
            max: MAX_ALIGN,
        }))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, alignment: usize) {
        let alignment = if alignment == 0 {
            natural_alignment(bytes, MAX_ALIGN)
        } else {
            alignment
        };
        debug_assert!(alignment.is_power_of_two(), "alignment must be a power of 2");

        if !alignment.is_power_of_two() || alignment > MAX_ALIGN {
            // No allocation could have been made with this request.
            error!(bytes, alignment, max = MAX_ALIGN, "deallocate with an unroutable alignment");
            return;
        }

        let chunks = bytes.div_ceil(alignment);
        trace!(bytes, alignment, chunks, "deallocate");

        let visitor = DeallocateChunks::<A, MAX_ALIGN> {
            backend: &self.backend,
            ptr,
            chunks,
        };
        dispatch(alignment, visitor);
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => std::ptr::eq(self, other) || self.backend == other.backend,
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Polymorphic memory resources for Rust.
//! Code allocates through `&dyn MemoryResource` and never names the concrete allocator; a
//! [`ResourceAdaptor`] turns any rebindable block allocator into such a resource by routing each
//! `(bytes, alignment)` request to a chunk class of matching alignment.
//! ## Setup & Usage
//! Pick a backend, wrap it in an adaptor, and hand out `&dyn MemoryResource` or a typed
//! [`PolymorphicAllocator`]. The `cli` feature builds the `memres` probe binary.

pub mod adaptor;
pub mod backend;
pub mod chunk;
pub mod dispatch;
pub mod error;
#[cfg(feature = "cli")]
pub mod output;
pub mod polymorphic;
pub(crate) mod registry;
pub mod report;
pub mod resource;
pub(crate) mod system;

pub use adaptor::ResourceAdaptor;
pub use backend::{ArenaAlloc, ArrayAlloc, Backend, BlockRecord, SystemAlloc, TrackingAlloc, TrackingStats};
pub use chunk::{ChunkClass, MAX_CHUNK_ALIGN};
pub use error::{AllocError, ProbeParseError};
pub use polymorphic::{CopyPolicy, MovePolicy, PmrBox, PolymorphicAllocator};
pub use registry::{get_default_resource, set_default_resource, DefaultResourceGuard};
pub use report::{run_probe, ProbeOutcome, ProbeReport, ProbeRequest};
pub use resource::{natural_alignment, same_object, MemoryResource, DEFAULT_MAX_ALIGN};
pub use system::{new_delete_resource, null_memory_resource, NewDeleteResource, NullResource};

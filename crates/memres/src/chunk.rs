//! Chunk classes: one plain-bytes type per power-of-two alignment.
//!
//! A backend that only knows how to allocate arrays of some `T` produces
//! memory aligned to `align_of::<T>()`. Rebinding it to `Chunk64` and asking
//! for `n` elements therefore yields `64 * n` bytes on a 64-byte boundary.
//! The types carry no meaning beyond their size and alignment.

use crate::dispatch::ClassVisitor;

/// A fixed-size, fixed-alignment block of raw bytes.
///
/// # Safety
///
/// Implementors must have `size_of::<Self>() == align_of::<Self>() == ALIGN`,
/// and `ALIGN == 1 << LOG2`.
pub unsafe trait ChunkClass: Copy + Send + Sync + 'static {
    /// Size and alignment of one chunk, in bytes.
    const ALIGN: usize;
    /// `log2(ALIGN)`.
    const LOG2: u32;
}

macro_rules! chunk_classes {
    ($($name:ident = $align:literal => $log2:literal),* $(,)?) => {
        $(
            #[doc = concat!("Chunk class of ", stringify!($align), " bytes, aligned to its size.")]
            #[derive(Clone, Copy)]
            #[repr(C, align($align))]
            pub struct $name([u8; $align]);

            unsafe impl ChunkClass for $name {
                const ALIGN: usize = $align;
                const LOG2: u32 = $log2;
            }
        )*

        /// Calls `visitor` with the chunk class whose `LOG2` equals `log2`.
        /// Returns `None` when no such class exists.
        pub(crate) fn visit_log2<V: ClassVisitor>(log2: u32, visitor: V) -> Option<V::Output> {
            match log2 {
                $($log2 => Some(visitor.visit::<$name>()),)*
                _ => None,
            }
        }
    };
}

// `repr(align)` tops out at 2^29.
chunk_classes! {
    Chunk1 = 1 => 0,
    Chunk2 = 2 => 1,
    Chunk4 = 4 => 2,
    Chunk8 = 8 => 3,
    Chunk16 = 16 => 4,
    Chunk32 = 32 => 5,
    Chunk64 = 64 => 6,
    Chunk128 = 128 => 7,
    Chunk256 = 256 => 8,
    Chunk512 = 512 => 9,
    Chunk1024 = 1024 => 10,
    Chunk2048 = 2048 => 11,
    Chunk4096 = 4096 => 12,
    Chunk8192 = 8192 => 13,
    Chunk16384 = 16384 => 14,
    Chunk32768 = 32768 => 15,
    Chunk65536 = 65536 => 16,
    Chunk131072 = 131072 => 17,
    Chunk262144 = 262144 => 18,
    Chunk524288 = 524288 => 19,
    Chunk1048576 = 1048576 => 20,
    Chunk2097152 = 2097152 => 21,
    Chunk4194304 = 4194304 => 22,
    Chunk8388608 = 8388608 => 23,
    Chunk16777216 = 16777216 => 24,
    Chunk33554432 = 33554432 => 25,
    Chunk67108864 = 67108864 => 26,
    Chunk134217728 = 134217728 => 27,
    Chunk268435456 = 268435456 => 28,
    Chunk536870912 = 536870912 => 29,
}

/// Largest alignment any chunk class provides, and therefore the largest
/// `MAX_ALIGN` an adaptor may be configured with.
pub const MAX_CHUNK_ALIGN: usize = Chunk536870912::ALIGN;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    struct Shape;

    impl ClassVisitor for Shape {
        type Output = (usize, usize, usize, u32);

        fn visit<C: ChunkClass>(self) -> Self::Output {
            (size_of::<C>(), align_of::<C>(), C::ALIGN, C::LOG2)
        }
    }

    #[test]
    fn test_every_class_is_size_equals_align() {
        for log2 in 0..=29u32 {
            let (size, align, declared, declared_log2) =
                visit_log2(log2, Shape).expect("class exists");
            assert_eq!(size, 1usize << log2);
            assert_eq!(align, 1usize << log2);
            assert_eq!(declared, 1usize << log2);
            assert_eq!(declared_log2, log2);
        }
    }

    #[test]
    fn test_no_class_past_the_largest() {
        assert!(visit_log2(30, Shape).is_none());
        assert_eq!(MAX_CHUNK_ALIGN, 1 << 29);
    }
}

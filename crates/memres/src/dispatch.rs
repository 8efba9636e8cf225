//! Alignment routing.
//!
//! A resolved alignment is turned into a chunk-class index with a
//! constant number of shifts, then dispatched straight to the matching
//! [`ChunkClass`].

use crate::chunk::{visit_log2, ChunkClass};

/// Generic callback over a chunk class.
///
/// Closures cannot be generic over a type, so routing goes through this
/// trait instead: `dispatch` picks the class, the visitor does the work.
pub trait ClassVisitor {
    type Output;

    fn visit<C: ChunkClass>(self) -> Self::Output;
}

/// `floor(log2(n))` by bit-halving: six range tests, each shifting away the
/// half that is known to be non-zero. Returns `0` for `n == 0`.
#[inline]
pub const fn integral_log2(n: usize) -> u32 {
    let mut n = n as u64;
    let mut result = 0;
    if n >= 1 << 32 {
        result += 32;
        n >>= 32;
    }
    if n >= 1 << 16 {
        result += 16;
        n >>= 16;
    }
    if n >= 1 << 8 {
        result += 8;
        n >>= 8;
    }
    if n >= 1 << 4 {
        result += 4;
        n >>= 4;
    }
    if n >= 1 << 2 {
        result += 2;
        n >>= 2;
    }
    if n >= 1 << 1 {
        result += 1;
    }
    result
}

/// Routes `visitor` to the chunk class for `alignment`.
///
/// `alignment` must be a power of two. Returns `None` if it is larger than
/// every chunk class.
#[inline]
pub fn dispatch<V: ClassVisitor>(alignment: usize, visitor: V) -> Option<V::Output> {
    debug_assert!(alignment.is_power_of_two(), "alignment must be a power of 2");
    visit_log2(integral_log2(alignment), visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Align;

    impl ClassVisitor for Align {
        type Output = usize;

        fn visit<C: ChunkClass>(self) -> usize {
            C::ALIGN
        }
    }

    #[test]
    fn test_integral_log2_matches_ilog2() {
        for n in (1..5000usize).chain([1 << 31, (1 << 31) + 7, usize::MAX]) {
            assert_eq!(integral_log2(n), n.ilog2(), "n = {n}");
        }
        assert_eq!(integral_log2(0), 0);
    }

    #[test]
    fn test_dispatch_lands_on_matching_class() {
        let mut alignment = 1usize;
        while alignment <= 1 << 29 {
            assert_eq!(dispatch(alignment, Align), Some(alignment));
            alignment *= 2;
        }
        assert_eq!(dispatch(1 << 30, Align), None);
    }
}

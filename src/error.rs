//! Error types for pool and container operations.

use crate::buffer::BufferId;

/// Errors that can occur while renting, returning or validating buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The requested capacity is larger than the biggest size class.
    #[error("capacity {requested} exceeds maximum of {max} elements")]
    CapacityOverflow {
        /// Capacity that was asked for, in elements.
        requested: usize,
        /// Largest capacity the pool can hand out.
        max: usize,
    },

    /// A container or descriptor was released more than once.
    #[error("buffer {id} released twice")]
    DoubleRelease {
        /// Descriptor that was already released.
        id: BufferId,
    },

    /// A token refers to an older generation of a recycled descriptor.
    #[error("buffer {id} is stale (token generation {expected}, live generation {found})")]
    StaleGeneration {
        /// Descriptor the token refers to.
        id: BufferId,
        /// Generation recorded in the token.
        expected: u64,
        /// Generation the descriptor has now.
        found: u64,
    },

    /// The allocator could not produce a buffer.
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed {
        /// Size of the failed allocation.
        bytes: usize,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Panic for a container accessed after `dispose`.
#[cold]
#[track_caller]
pub(crate) fn use_after_dispose(container: &str) -> ! {
    panic!("{container} used after dispose")
}

/// Panic for a failed growth in an infallible-looking method such as `push`.
#[cold]
#[track_caller]
pub(crate) fn growth_failed(container: &str, error: PoolError) -> ! {
    panic!("{container} failed to grow: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!(
                "{}",
                PoolError::CapacityOverflow {
                    requested: 10,
                    max: 4
                }
            ),
            "capacity 10 exceeds maximum of 4 elements"
        );
        assert_eq!(
            format!(
                "{}",
                PoolError::DoubleRelease {
                    id: BufferId::new(3)
                }
            ),
            "buffer #3 released twice"
        );
        assert_eq!(
            format!(
                "{}",
                PoolError::StaleGeneration {
                    id: BufferId::new(1),
                    expected: 2,
                    found: 5
                }
            ),
            "buffer #1 is stale (token generation 2, live generation 5)"
        );
        assert_eq!(
            format!("{}", PoolError::AllocationFailed { bytes: 64 }),
            "failed to allocate 64 bytes"
        );
    }

    #[test]
    fn test_error_is_error_trait() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<PoolError>();
    }

    #[test]
    fn test_pool_result_err() {
        let result: PoolResult<i32> = Err(PoolError::AllocationFailed { bytes: 1 });
        assert!(matches!(result, Err(PoolError::AllocationFailed { bytes: 1 })));
    }
}

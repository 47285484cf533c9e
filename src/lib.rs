//! pooled-collections: containers that recycle their backing buffers.
//!
//! This crate provides pooled versions of the everyday containers together
//! with a fused query pipeline that writes straight into pooled storage:
//!
//! - **Pool**: size-classed free lists per element type, with a quarantine
//!   that holds retired buffers until [`Pool::maintain`] runs
//! - **Policy**: retention and maintenance settings, loadable from TOML
//! - **List**: [`PooledList`], growing by rent-new/move/retire-old
//! - **Dictionaries**: [`PooledDictionary`] (classic probing) and
//!   [`PooledSwissDictionary`] (16-wide control-byte groups)
//! - **Sets**: [`PooledHashSet`] and [`PooledSwissSet`]
//! - **Strings**: [`PooledStringBuilder`]
//! - **Queries**: [`Query`] with `filter`/`map`/`take`, materialized by
//!   [`Query::to_pooled_list`] in a single pass
//!
//! # Buffer lifecycle
//!
//! ```text
//!            rent                 retire / drop            maintain
//!   +------+ ----> +----------+ ------------> +-------------+ -------> +-----------+
//!   | pool |       |   lent   |               | quarantined |          | free list |
//!   +------+       +----------+               +-------------+          +-----------+
//!      ^                 |  release (no pins)                               |
//!      |                 +--------------------------------------------------+
//!      +--------------------------------- rent (reuse) ---------------------+
//! ```
//!
//! Every lent buffer carries a generation. Leaving quarantine bumps it, so a
//! [`BufferToken`] taken earlier is reported stale by [`Pool::validate`]
//! instead of silently seeing reused memory. A [`ViewPin`] keeps a retired
//! buffer in quarantine for as long as the pin lives.
//!
//! # Example
//!
//! ```
//! use pooled_collections::{Pool, Policy, PooledList};
//!
//! let pool = Pool::new(Policy::default());
//!
//! let mut list = PooledList::create_in(&pool, 8).unwrap();
//! list.extend([5, 3, 1, 4, 2]);
//! list.sort();
//! assert_eq!(list, [1, 2, 3, 4, 5]);
//! let storage = list.as_ptr();
//! list.dispose().unwrap();
//!
//! // once maintained, the next list of the same class reuses the storage
//! pool.maintain();
//! let again = PooledList::<i32>::create_in(&pool, 8).unwrap();
//! assert_eq!(again.as_ptr(), storage);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Pool core
mod buffer;
mod config;
mod error;
mod free_list;
mod metrics;
mod pool;
mod quarantine;
mod registry;
mod size_class;

// Containers
mod list;
mod map;
mod set;
mod string_builder;
mod table;
mod traits;

// Queries
mod query;

// Re-exports
pub use buffer::{Buffer, BufferId, BufferToken, ViewPin};
pub use config::{ConfigError, DEFAULT_MAX_RETAINED_LENGTH, DEFAULT_PER_CLASS_LIMIT, Policy};
pub use error::{PoolError, PoolResult};
pub use free_list::UPSIZE_SEARCH;
pub use metrics::{MaintainReport, PoolStats};
pub use pool::Pool;
pub use registry::DescriptorState;
pub use size_class::{MAX_CAPACITY, MIN_CAPACITY, NUM_SIZE_CLASSES, SizeClass};

pub use list::PooledList;
pub use map::{PooledDictionary, PooledMap, PooledSwissDictionary};
pub use set::{PooledHashSet, PooledSet, PooledSwissSet};
pub use string_builder::PooledStringBuilder;
pub use table::{ClassicIter, ClassicTable, GROUP_WIDTH, SwissIter, SwissTable, TableStrategy};
pub use traits::{AssociativeContainer, SequenceContainer};

pub use query::{DEFAULT_QUERY_CAPACITY, Flow, Identity, Query, Select, Stage, Take, Where};

//! Form-state persistence with debounced writes.
//!
//! `formstash` keeps an in-memory field map in sync with a persistent
//! key-value store. Mutations are synchronous and cheap; a debounce timer
//! coalesces bursts into a single write of the latest snapshot. Stored data
//! is merged over caller defaults once at hydration, selected paths can be
//! held back from persistence, and storage failures degrade to an in-memory
//! fallback instead of surfacing to the caller.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`persist`] | The [`FormPersist`] controller and its options |
//! | [`storage`] | Storage backends and the degrading adapter |
//! | [`debounce`] | Debounce and throttle primitives |
//! | [`exclude`] | Path-based exclusion filtering |
//! | [`codec`] | Pluggable record encoding (JSON by default) |
//! | [`fields`] | Field-map conversions and shallow merge |

pub mod codec;
pub mod debounce;
pub mod exclude;
pub mod fields;
pub mod persist;
pub mod storage;

pub use codec::{Codec, CodecError, JsonCodec};
pub use debounce::{Debouncer, Throttle};
pub use fields::{FieldMap, FieldsError};
pub use persist::{ErrorObserver, FormPersist, PersistError, PersistOptions};
pub use storage::{DiskBackend, StorageAdapter, StorageBackend, StorageError, StoreOutcome};

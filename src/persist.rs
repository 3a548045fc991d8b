//! Persistence controller — hydration, mutation, and debounced writes.
//!
//! DESIGN
//! ======
//! [`FormPersist`] owns the live field map. Mutations update memory
//! synchronously and re-arm a debounced write of the full snapshot, so the
//! write that eventually fires carries the newest state and intermediate
//! states inside the quiet period are never persisted. Hydration runs at
//! most once: the stored record is decoded and shallow-merged over the
//! defaults, and any failure leaves the defaults in place. Writes only
//! start once hydration has completed; earlier mutations affect memory
//! only.
//!
//! ERROR HANDLING
//! ==============
//! Nothing in the public surface returns an error or panics. Decode,
//! encode, and storage failures are logged, routed to the configured
//! observer, and recovered locally — the in-memory state is the source of
//! truth and keeps working when every write degrades.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::codec::{Codec, CodecError, JsonCodec};
use crate::debounce::Debouncer;
use crate::exclude::filter_excluded;
use crate::fields::{self, FieldMap, FieldsError};
use crate::storage::{StorageAdapter, StorageError, StoreOutcome};

/// Default quiet period between the last mutation and the persisted write.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Observer invoked with every recovered persistence failure.
pub type ErrorObserver = Arc<dyn Fn(&PersistError) + Send + Sync>;

/// Failure recovered by the controller and routed to the error observer.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A stored record could not be decoded; defaults were kept.
    #[error("failed to decode persisted record: {0}")]
    Decode(#[source] CodecError),
    /// A stored record decoded to something other than an object; defaults
    /// were kept.
    #[error("persisted record is not an object (got {0})")]
    MalformedRecord(&'static str),
    /// The candidate state could not be encoded; the write was skipped.
    #[error("failed to encode state for persistence: {0}")]
    Encode(#[source] CodecError),
    /// The persistent backend rejected an operation; the in-memory fallback
    /// absorbed it.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Controller configuration. `Default` gives JSON encoding, a 300 ms quiet
/// period, no exclusions, and persistence enabled.
#[derive(Clone)]
pub struct PersistOptions {
    /// Quiet period between the last mutation and the persisted write.
    pub debounce_ms: u64,
    /// Dot-separated paths never persisted (see [`crate::exclude`]).
    pub exclude: Vec<String>,
    /// Codec for the stored record.
    pub codec: Arc<dyn Codec>,
    /// Observer for recovered failures.
    pub on_error: Option<ErrorObserver>,
    /// Master switch for storage I/O. When off, hydration and writes skip
    /// the adapter while in-memory mutation keeps working.
    pub enabled: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            exclude: Vec::new(),
            codec: Arc::new(JsonCodec),
            on_error: None,
            enabled: true,
        }
    }
}

/// Hydration lifecycle of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HydrationPhase {
    Uninitialized,
    Hydrating,
    Hydrated,
}

/// Everything the write path needs, shared with the debounce task.
struct WritePipeline {
    key: String,
    adapter: Arc<StorageAdapter>,
    exclude: Vec<String>,
    codec: Arc<dyn Codec>,
    on_error: Option<ErrorObserver>,
    enabled: bool,
}

impl WritePipeline {
    fn report(&self, error: &PersistError) {
        if let Some(observer) = &self.on_error {
            observer(error);
        }
    }

    /// Filter, encode, and store one full snapshot of the state.
    async fn commit(&self, snapshot: FieldMap) {
        if !self.enabled {
            return;
        }
        let candidate = if self.exclude.is_empty() {
            snapshot
        } else {
            filter_excluded(&snapshot, &self.exclude)
        };
        let encoded = match self.codec.encode(&Value::Object(candidate)) {
            Ok(encoded) => encoded,
            Err(error) => {
                let error = PersistError::Encode(error);
                warn!(key = %self.key, error = %error, "skipping persisted write");
                self.report(&error);
                return;
            }
        };
        if let StoreOutcome::FellBack(failure) = self.adapter.set(&self.key, &encoded).await {
            self.report(&PersistError::Storage(failure));
        }
    }
}

/// Synchronizes an in-memory field map with a persistent key-value store.
///
/// Construction leaves the state at the caller's defaults;
/// [`hydrate`](Self::hydrate) must run once before stored data becomes
/// visible. Mutations return immediately and the store catches up after
/// the configured quiet period. All methods require a Tokio runtime.
pub struct FormPersist {
    values: FieldMap,
    defaults: FieldMap,
    phase: HydrationPhase,
    pipeline: Arc<WritePipeline>,
    saver: Debouncer<FieldMap>,
}

impl FormPersist {
    /// Controller for `key` over `adapter`, starting from `defaults`.
    #[must_use]
    pub fn new(
        adapter: StorageAdapter,
        key: impl Into<String>,
        defaults: FieldMap,
        options: PersistOptions,
    ) -> Self {
        let pipeline = Arc::new(WritePipeline {
            key: key.into(),
            adapter: Arc::new(adapter),
            exclude: options.exclude,
            codec: options.codec,
            on_error: options.on_error,
            enabled: options.enabled,
        });
        let saver = {
            let pipeline = Arc::clone(&pipeline);
            Debouncer::new(
                Duration::from_millis(options.debounce_ms),
                move |snapshot: FieldMap| -> BoxFuture<'static, ()> {
                    let pipeline = Arc::clone(&pipeline);
                    Box::pin(async move { pipeline.commit(snapshot).await })
                },
            )
        };
        Self {
            values: defaults.clone(),
            defaults,
            phase: HydrationPhase::Uninitialized,
            pipeline,
            saver,
        }
    }

    /// Controller built from any serializable defaults shape.
    ///
    /// # Errors
    /// Fails when `defaults` does not serialize to a JSON object.
    pub fn with_defaults<T: Serialize>(
        adapter: StorageAdapter,
        key: impl Into<String>,
        defaults: &T,
        options: PersistOptions,
    ) -> Result<Self, FieldsError> {
        Ok(Self::new(adapter, key, fields::to_fields(defaults)?, options))
    }

    /// One-shot hydration: read, decode, and shallow-merge the stored
    /// record over the defaults (stored keys win, missing keys keep their
    /// default). Always leaves the controller hydrated, even when the read
    /// or decode fails. Later calls are no-ops.
    pub async fn hydrate(&mut self) {
        if self.phase != HydrationPhase::Uninitialized {
            return;
        }
        self.phase = HydrationPhase::Hydrating;
        if self.pipeline.enabled {
            if let Some(raw) = self.pipeline.adapter.get(&self.pipeline.key).await {
                match self.pipeline.codec.decode(&raw) {
                    Ok(Value::Object(stored)) => {
                        self.values = fields::shallow_merge(&self.defaults, stored);
                    }
                    Ok(other) => {
                        let error = PersistError::MalformedRecord(fields::kind(&other));
                        warn!(key = %self.pipeline.key, error = %error, "keeping defaults");
                        self.pipeline.report(&error);
                    }
                    Err(source) => {
                        let error = PersistError::Decode(source);
                        warn!(key = %self.pipeline.key, error = %error, "keeping defaults");
                        self.pipeline.report(&error);
                    }
                }
            }
        }
        self.phase = HydrationPhase::Hydrated;
    }

    /// Read-only view of the current state.
    #[must_use]
    pub fn values(&self) -> &FieldMap {
        &self.values
    }

    /// Deserialize the current state into the caller's shape.
    ///
    /// # Errors
    /// Fails when the current state does not match `T`.
    pub fn values_as<T: DeserializeOwned>(&self) -> Result<T, FieldsError> {
        fields::from_fields(&self.values)
    }

    /// Whether the one-shot hydration attempt has completed.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.phase == HydrationPhase::Hydrated
    }

    /// Whether a debounced write is still waiting for its quiet period.
    #[must_use]
    pub fn write_pending(&self) -> bool {
        self.saver.is_pending()
    }

    /// Replace one field and schedule a persisted write.
    pub fn set_value(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
        self.schedule_write();
    }

    /// Shallow-merge `partial` onto the state and schedule a persisted
    /// write. Top-level keys only: a nested object in `partial` replaces
    /// its counterpart wholesale.
    pub fn set_values(&mut self, partial: FieldMap) {
        for (field, value) in partial {
            self.values.insert(field, value);
        }
        self.schedule_write();
    }

    /// Remove the stored record and reset the state to the defaults.
    ///
    /// Runs immediately, bypassing the debounce. Any write still pending is
    /// cancelled first so it cannot resurrect the cleared record. The
    /// remove is issued even when persistence is disabled.
    pub async fn clear_persisted(&mut self) {
        self.saver.cancel();
        if let StoreOutcome::FellBack(failure) =
            self.pipeline.adapter.remove(&self.pipeline.key).await
        {
            self.pipeline.report(&PersistError::Storage(failure));
        }
        // The retained defaults must survive later mutation of the live
        // map, so the reset installs an independent deep copy.
        self.values = self.defaults.clone();
    }

    /// Write the current state now, skipping the quiet period. A no-op
    /// before hydration, matching the debounced path.
    pub async fn flush(&mut self) {
        self.saver.cancel();
        if self.phase == HydrationPhase::Hydrated {
            self.pipeline.commit(self.values.clone()).await;
        }
    }

    fn schedule_write(&mut self) {
        if self.phase != HydrationPhase::Hydrated {
            return;
        }
        // Full snapshot per call: the write that fires carries the latest
        // state, never an intermediate one.
        self.saver.call(self.values.clone());
    }
}

#[cfg(test)]
#[path = "persist_test.rs"]
mod tests;

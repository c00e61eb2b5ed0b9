//! Source manager registry and dispatch

use futures_util::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::codec;
use crate::error::{DecodeError, SourceError};
use crate::protocol::{Empty, LoadResult, Severity, Track, TrackRecord};
use crate::sources::{Resolution, SourceManager};

/// Registration-ordered set of source managers
///
/// Empty at startup; populated while the node boots. Dispatch clones the
/// selected manager out of the lock, so resolution never runs under it.
#[derive(Default)]
pub struct SourceRegistry {
    managers: RwLock<Vec<Arc<dyn SourceManager>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manager. A manager with the same name is replaced in place.
    pub fn register(&self, manager: Arc<dyn SourceManager>) {
        let mut managers = self.managers.write();
        match managers.iter_mut().find(|m| m.name() == manager.name()) {
            Some(slot) => {
                tracing::warn!("Replacing source manager '{}'", manager.name());
                *slot = manager;
            }
            None => {
                tracing::info!("Registered source manager '{}'", manager.name());
                managers.push(manager);
            }
        }
    }

    /// Look up a manager by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceManager>> {
        self.managers.read().iter().find(|m| m.name() == name).cloned()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.managers
            .read()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.read().is_empty()
    }

    /// First registered manager whose predicate accepts the identifier
    pub fn find_manager(&self, identifier: &str) -> Option<Arc<dyn SourceManager>> {
        self.managers
            .read()
            .iter()
            .find(|m| m.can_handle(identifier))
            .cloned()
    }

    /// Resolve an identifier with the matching manager
    pub async fn resolve(&self, identifier: &str) -> Result<Resolution, SourceError> {
        let manager = self
            .find_manager(identifier)
            .ok_or_else(|| SourceError::NoSource(identifier.to_string()))?;
        resolve_guarded(manager.as_ref(), identifier).await
    }

    /// Resolve and encode an identifier into a `/loadtracks` response
    ///
    /// Every failure is folded into `LoadResult::Error`.
    pub async fn load(&self, identifier: &str) -> LoadResult {
        match self.try_load(identifier).await {
            Ok(result) => result,
            Err(e) => {
                match e.severity() {
                    Severity::Common => {
                        tracing::debug!("Load of '{}' failed: {}", identifier, e)
                    }
                    Severity::Fault => {
                        tracing::warn!("Load of '{}' failed: {}", identifier, e)
                    }
                }
                LoadResult::error(e.to_string(), e.severity())
            }
        }
    }

    async fn try_load(&self, identifier: &str) -> Result<LoadResult, SourceError> {
        let manager = self
            .find_manager(identifier)
            .ok_or_else(|| SourceError::NoSource(identifier.to_string()))?;
        tracing::debug!("Loading '{}' with '{}'", identifier, manager.name());

        let result = match resolve_guarded(manager.as_ref(), identifier).await? {
            Resolution::Track(info) => LoadResult::Track(Track::new(manager.encode(&info)?, info)),
            Resolution::Search(infos) if infos.is_empty() => LoadResult::Empty(Empty {}),
            Resolution::Search(infos) => {
                let tracks = infos
                    .into_iter()
                    .map(|info| Ok(Track::new(manager.encode(&info)?, info)))
                    .collect::<Result<Vec<_>, SourceError>>()?;
                LoadResult::Search(tracks)
            }
        };

        Ok(result)
    }

    /// Decode a track with the manager that produced it
    ///
    /// Tracks from a source that is not registered are decoded generically.
    pub fn decode(&self, encoded: &str) -> Result<TrackRecord, DecodeError> {
        let record = codec::decode_track(encoded)?;
        match self.get(&record.info.source_name) {
            Some(manager) => manager.decode(encoded),
            None => Ok(record),
        }
    }
}

/// Run a manager's resolve, turning a panic into a fault
async fn resolve_guarded(
    manager: &dyn SourceManager,
    identifier: &str,
) -> Result<Resolution, SourceError> {
    match AssertUnwindSafe(manager.resolve(identifier)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(SourceError::fault(format!(
            "Source manager '{}' panicked",
            manager.name()
        ))),
    }
}

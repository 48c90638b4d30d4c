use crate::engine::{CastStore, CastStoreInner};
use crate::error::{StorageError, StorageErrorExt};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
struct StoreConfig {
    create: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { create: true }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct CastStoreBuilder<S: Sealed = NoRoot> {
    state: S,
    config: StoreConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> CastStoreBuilder<S> {
    #[must_use = "Sets whether the storage root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> CastStoreBuilder<N> {
        CastStoreBuilder { state, config: self.config }
    }
}

impl CastStoreBuilder<NoRoot> {
    #[must_use = "Creates a new store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the directory that holds every owner's casts"]
    pub fn root(self, path: impl Into<PathBuf>) -> CastStoreBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl CastStoreBuilder<WithRoot> {
    /// Consumes the configuration and opens the store.
    ///
    /// 1. Creates the root directory if `create(true)` was set (the default).
    /// 2. Canonicalizes the root so symlink checks compare physical paths.
    /// 3. Removes `.tmp` files abandoned by uploads that died more than five minutes ago.
    ///
    /// The purge is best effort and never fails the connect.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the root cannot be created or resolved, including when
    /// it does not exist and `create(false)` was set.
    pub async fn connect(self) -> Result<CastStore, StorageError> {
        let root = &self.state.0;

        if self.config.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap storage root: {}", root.display()))?;
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve storage root: {}", root.display()))?;

        info!(path = %canonical.display(), "Cast store ready");

        let store = CastStore { inner: Arc::new(CastStoreInner { root: canonical }) };
        store.purge_tmp().await;

        Ok(store)
    }
}

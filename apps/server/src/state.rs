use axum::extract::FromRef;
use shelf_domain::config::AppConfig;
use shelf_storage::CastStore;
use std::borrow::Cow;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

#[shelf_derive::shelf_error]
pub enum AppStateError {
    #[error("State validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[derive(Debug)]
pub struct AppStateInner {
    pub config: AppConfig,
    pub store: CastStore,
    started: Instant,
}

impl AppStateInner {
    /// Seconds since the state was built.
    #[must_use]
    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Shared handler state: the loaded configuration and the cast store.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.inner.config.clone()
    }
}

impl FromRef<AppState> for CastStore {
    fn from_ref(state: &AppState) -> Self {
        state.inner.store.clone()
    }
}

#[derive(Debug, Default)]
pub struct AppStateBuilder {
    config: Option<AppConfig>,
    store: Option<CastStore>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn store(mut self, store: CastStore) -> Self {
        self.store = Some(store);
        self
    }

    /// # Errors
    /// Returns [`AppStateError::Validation`] if no store was provided.
    pub fn build(self) -> Result<AppState, AppStateError> {
        let store = self.store.ok_or_else(|| AppStateError::Validation {
            message: "CastStore not provided".into(),
            context: None,
        })?;
        let config = self.config.unwrap_or_default();

        Ok(AppState { inner: Arc::new(AppStateInner { config, store, started: Instant::now() }) })
    }
}

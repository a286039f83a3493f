//! The offline worker.
//!
//! A [`ServiceWorker`] reacts to three lifecycle events, in the order the
//! host delivers them:
//!
//! - `Install`: pre-cache the manifest into the current generation, then ask
//!   to skip waiting.
//! - `Activate`: delete every other generation, then claim open clients.
//! - `Fetch`: network first, cache as fallback, synthesized 503 last.
//!
//! Storage and network are injected (`Arc<dyn CacheStorage>`,
//! `Arc<dyn Fetcher>`); nothing here touches a global.

pub mod activate;
pub mod install;
pub mod intercept;
pub mod registration;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use swcache_core::{CacheStorage, Error, Request};
use url::Url;

use crate::fetch::Fetcher;

pub use activate::ActivateReport;
pub use install::InstallReport;
pub use intercept::{InterceptState, Interception, Interceptor, OFFLINE_BODY, ResponseSource};
pub use registration::{ClientInfo, Registration, WorkerState};

/// Name of the current cache generation.
pub const CACHE_NAME: &str = "debt-ledger-v1";

/// App shell pre-cached at install, relative to the scope.
pub const MANIFEST: &[&str] = &["./", "./index.html"];

/// Lifecycle events delivered by the host.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
}

/// What handling an event produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Responded(Interception),
}

/// How [`ServiceWorker::start`] brought the worker up.
#[derive(Debug)]
pub enum Startup {
    /// Install succeeded. `activated` is `None` while the worker waits.
    Installed { installed: InstallReport, activated: Option<ActivateReport> },
    /// Install failed, but the generation was already on disk from an
    /// earlier run; the worker serves from it.
    Resumed { install_error: Error },
}

/// One version of the worker bound to its storage and network.
pub struct ServiceWorker {
    generation: String,
    manifest: Vec<String>,
    scope: Url,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    registration: Arc<Registration>,
}

impl ServiceWorker {
    /// A worker for [`CACHE_NAME`] pre-caching [`MANIFEST`].
    pub fn new(scope: Url, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            generation: CACHE_NAME.to_string(),
            manifest: MANIFEST.iter().map(|p| p.to_string()).collect(),
            scope,
            storage,
            fetcher,
            registration: Arc::new(Registration::new(CACHE_NAME)),
        }
    }

    /// Use another generation name. Resets the registration.
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = generation.into();
        self.registration = Arc::new(Registration::new(self.generation.clone()));
        self
    }

    pub fn with_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    fn interceptor(&self) -> Interceptor {
        Interceptor::new(self.generation.clone(), Arc::clone(&self.storage), Arc::clone(&self.fetcher))
    }

    /// Handle one lifecycle event.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Responded),
        }
    }

    /// Install, then activate if nothing holds activation back.
    ///
    /// When install fails but the current generation survives from an
    /// earlier run, the worker goes straight to `Activated` on that
    /// generation instead of failing.
    pub async fn start(&self) -> Result<Startup, Error> {
        let installed = match self.install().await {
            Ok(report) => report,
            Err(e) if self.storage.has(&self.generation).await.unwrap_or(false) => {
                return self.resume(e).await;
            }
            Err(e) => return Err(e),
        };
        if !self.registration.ready_to_activate().await {
            tracing::info!(generation = %self.generation, "installed, waiting to activate");
            return Ok(Startup::Installed { installed, activated: None });
        }
        let activated = self.activate().await?;
        Ok(Startup::Installed { installed, activated: Some(activated) })
    }

    async fn resume(&self, install_error: Error) -> Result<Startup, Error> {
        self.registration
            .transition(&[WorkerState::Redundant], WorkerState::Activated)
            .await?;
        let claimed = self.registration.claim().await;
        tracing::warn!(
            generation = %self.generation,
            error = %install_error,
            claimed,
            "install failed, serving existing cache"
        );
        Ok(Startup::Resumed { install_error })
    }

    /// Pre-cache the manifest. Any failure voids the attempt and leaves the
    /// worker redundant; installing again is allowed.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.registration
            .transition(&[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installing)
            .await?;
        tracing::info!(generation = %self.generation, "installing service worker");

        let result = install::precache(
            &self.generation,
            &self.manifest,
            &self.scope,
            self.storage.as_ref(),
            self.fetcher.as_ref(),
        )
        .await;

        match result {
            Ok(report) => {
                self.registration.skip_waiting();
                self.registration
                    .transition(&[WorkerState::Installing], WorkerState::Installed)
                    .await?;
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(generation = %self.generation, error = %e, "install failed");
                self.registration
                    .transition(&[WorkerState::Installing], WorkerState::Redundant)
                    .await?;
                Err(e)
            }
        }
    }

    /// Delete stale generations, then claim every open client.
    ///
    /// If the generations cannot even be listed the worker goes back to
    /// `Installed` and the error is returned.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.registration
            .transition(&[WorkerState::Installed], WorkerState::Activating)
            .await?;
        tracing::info!(generation = %self.generation, "activating service worker");

        let mut report = match activate::reclaim(&self.generation, self.storage.as_ref()).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(generation = %self.generation, error = %e, "activation failed");
                self.registration
                    .transition(&[WorkerState::Activating], WorkerState::Installed)
                    .await?;
                return Err(e);
            }
        };

        report.claimed = self.registration.claim().await;
        self.registration
            .transition(&[WorkerState::Activating], WorkerState::Activated)
            .await?;
        tracing::info!(
            generation = %self.generation,
            deleted = report.deleted.len(),
            claimed = report.claimed,
            "service worker active"
        );

        Ok(report)
    }

    /// Respond to a request. Fails only when the worker is not active yet.
    pub async fn handle_fetch(&self, request: Request) -> Result<Interception, Error> {
        let state = self.registration.state().await;
        if !state.can_intercept_fetch() {
            return Err(Error::InvalidState(format!("fetch event while {state}")));
        }
        Ok(self.interceptor().handle(request).await)
    }
}

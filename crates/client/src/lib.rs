//! Client code for swcache.
//!
//! This crate provides the network fetch pipeline and the worker that sits
//! in front of it: install-time pre-caching, activation-time cleanup of stale
//! cache generations, and network-first request interception.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher, UrlError, resolve};

pub use worker::{
    ActivateReport, CACHE_NAME, Event, EventOutcome, InstallReport, InterceptState, Interception, MANIFEST,
    OFFLINE_BODY, Registration, ResponseSource, ServiceWorker, Startup, WorkerState,
};

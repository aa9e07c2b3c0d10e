//! Aurum Ledger
//!
//! Dealer-ledger and consignment-settlement engine for a retail jewellery
//! business. The crate keeps a signed running balance per external party
//! (supplying dealers and consignment agents) consistent with physical
//! inventory counts across multi-step workflows — issue goods, partial sell,
//! partial return, settle — while preserving an append-only audit trail that
//! supports point-in-time balance reconstruction.
//!
//! This is a library: transport, authentication, and rendering live in the
//! embedding application, which builds an [`AppState`] and calls the service
//! operations directly.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{ServiceContainer, ServiceFactory};

/// Shared application state handed to embedders.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: ServiceContainer,
}

impl AppState {
    /// Full bootstrap: configuration, tracing, pool, migrations, event
    /// relay, services. Returns the state and the relay task handle.
    pub async fn initialize() -> anyhow::Result<(Self, JoinHandle<()>)> {
        let config = config::load_config()?;
        config::init_tracing(&config.log_level, config.log_json);
        Self::from_config(config).await
    }

    /// Bootstrap from an already-loaded configuration (tracing left to the
    /// caller; tests use this).
    pub async fn from_config(config: AppConfig) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = EventSender::new(event_tx);
        let relay = tokio::spawn(events::process_events(event_rx));

        let db = Arc::new(pool);
        let config = Arc::new(config);
        let factory = ServiceFactory::new(db.clone(), event_sender.clone(), config.clone());
        let services = ServiceContainer::new(&factory);

        Ok((
            Self {
                db,
                config,
                event_sender,
                services,
            },
            relay,
        ))
    }
}

/// Common query parameters for list operations.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u64,
    /// Items per page; the configured default when absent, clamped to the
    /// configured maximum.
    pub per_page: Option<u64>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: None,
        }
    }
}

impl PageRequest {
    /// Resolves to a `(page, per_page)` pair within configured bounds.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        let per_page = self
            .per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);
        (self.page.max(1), per_page)
    }
}

fn default_page() -> u64 {
    1
}

/// Common response wrapper for list operations.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, consignments::ConsignmentService, inventory::InventoryService,
        ledger::LedgerService, reports::ReportService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    config: Arc<AppConfig>,
}

impl ServiceFactory {
    /// Creates a new service factory with the given dependencies
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: Arc<AppConfig>) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    /// Creates an inventory service instance
    pub fn inventory_service(&self) -> InventoryService {
        InventoryService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.clone(),
        )
    }

    /// Creates an account service instance
    pub fn account_service(&self) -> AccountService {
        AccountService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.clone(),
        )
    }

    /// Creates a ledger read service instance
    pub fn ledger_service(&self) -> LedgerService {
        LedgerService::new(self.db_pool.clone(), self.config.clone())
    }

    /// Creates a consignment workflow service instance
    pub fn consignment_service(&self) -> ConsignmentService {
        ConsignmentService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.clone(),
        )
    }

    /// Creates a reporting service instance
    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.db_pool.clone())
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    /// Gets a reference to the event sender
    pub fn event_sender(&self) -> &EventSender {
        &self.event_sender
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub inventory: Arc<InventoryService>,
    pub accounts: Arc<AccountService>,
    pub ledger: Arc<LedgerService>,
    pub consignments: Arc<ConsignmentService>,
    pub reports: Arc<ReportService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            inventory: Arc::new(factory.inventory_service()),
            accounts: Arc::new(factory.account_service()),
            ledger: Arc::new(factory.ledger_service()),
            consignments: Arc::new(factory.consignment_service()),
            reports: Arc::new(factory.report_service()),
        }
    }
}

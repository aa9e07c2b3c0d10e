use aurum_ledger::{
    config::AppConfig,
    entities::item,
    services::inventory::CreateItemInput,
    AppState,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Helper harness booting the real application state against a file-backed
/// SQLite database. Each test gets its own file so suites can run
/// concurrently.
pub struct TestContext {
    pub state: AppState,
    db_file: std::path::PathBuf,
    _relay: tokio::task::JoinHandle<()>,
}

impl TestContext {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file =
            std::env::temp_dir().join(format!("aurum_ledger_test_{}.db", Uuid::new_v4().simple()));
        let _ = std::fs::remove_file(&db_file);

        let config = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", db_file.display()),
            db_max_connections: 1,
            db_min_connections: 1,
            environment: "test".to_string(),
            ..AppConfig::default()
        };

        let (state, relay) = AppState::from_config(config)
            .await
            .expect("failed to boot test application state");

        Self {
            state,
            db_file,
            _relay: relay,
        }
    }

    /// Registers an item with the given serial, price, and on-hand count.
    pub async fn seed_item(&self, serial: &str, price: Decimal, count: i32) -> item::Model {
        self.state
            .services
            .inventory
            .create_item(CreateItemInput {
                serial_code: serial.to_string(),
                name: format!("Test item {}", serial),
                unit_price: price,
                initial_count: count,
            })
            .await
            .expect("failed to seed item")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self._relay.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

use product_service::config::ProductConfig;
use product_service::services::MongoDb;
use product_service::startup::Application;
use std::time::Duration;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: MongoDb,
    pub db_name: String,
}

impl TestApp {
    /// Spawn the application on a random port without waiting for the
    /// connection bootstrap. The driver handle is lazy, so this works with
    /// or without a reachable MongoDB.
    pub async fn spawn() -> Self {
        if std::env::var("MONGO_URI").is_err() {
            std::env::set_var("MONGO_URI", "mongodb://localhost:27017");
        }

        let db_name = format!("products_test_{}", Uuid::new_v4().simple());

        let mut config = ProductConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.mongodb.database = db_name.clone();

        let db = MongoDb::new(&config.mongodb.uri, &config.mongodb.database)
            .await
            .expect("Failed to build MongoDB handle");

        let app = Application::build(config, db.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the HTTP server to be ready
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
        }
    }

    /// Single-attempt connection bootstrap. Tests that need a live database
    /// call this first and skip when it fails.
    pub async fn try_establish(&self) -> bool {
        self.db.establish(1, Duration::from_millis(100)).await.is_ok()
    }

    /// Drop the throwaway test database.
    pub async fn cleanup(&self) {
        let _ = self.db.client().database(&self.db_name).drop(None).await;
    }
}

pub mod database;
pub mod metrics;

pub use database::{ConnectionState, ConnectionStatus, MongoDb};
pub use metrics::{get_metrics, init_metrics};

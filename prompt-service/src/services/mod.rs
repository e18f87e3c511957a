pub mod database;
pub mod metrics;
pub mod providers;
pub mod request_handler;
pub mod store;

pub use database::{Database, PgRecordStore};
pub use metrics::{get_metrics, init_metrics};
pub use request_handler::{Generation, HandlerError, RequestHandler};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};

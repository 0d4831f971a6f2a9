// Flight deal alerts: search cheap round trips to the destinations kept in a
// spreadsheet and push an alert when a fare beats the stored threshold.

pub mod config;
pub mod destinations;
pub mod flight_data;
pub mod flight_search;
pub mod notification;
pub mod offers;
pub mod orchestrator;
pub mod retry;
pub mod transport;

// Re-export key types for convenience
pub use config::{AppConfig, ConfigError};
pub use destinations::{DestinationRow, DestinationStore, SheetyStore, StoreError};
pub use flight_data::{FlightQuote, RoundTripQuery, SearchOutcome, NOT_AVAILABLE};
pub use flight_search::{FlightSearch, FlightSearchClient};
pub use notification::{Notifier, NotifyError, PushoverNotifier};
pub use orchestrator::{DealFinder, RunError, RunReport};
pub use retry::RetryConfig;
pub use transport::{ApiError, ReqwestTransport, Transport};

//! Discovery of client records published across teams.

mod record;
mod scanner;

pub use record::{load_record, RecordError, RemoteRecord};
pub use scanner::{DiscoveryError, DiscoveryResult, DiscoveryScanner};

// unipulse-api: wire types and a read-only query client for the telemetry store

pub mod client;
pub mod columnar;
pub mod error;
pub mod transport;

pub use client::{Credentials, QueryClient};
pub use columnar::{ColumnarResponse, Series, StatementResult};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};

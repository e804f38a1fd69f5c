// ── Domain model ──
//
// Value types produced fresh by every aggregation call. Nothing here is
// mutated after construction and nothing is shared between calls.

pub mod series;
pub mod ssid;
pub mod timestamp;
pub mod traffic;

pub use series::TimeSeriesPoint;
pub use ssid::{Band, BandChannels, NormalizedSsid, VapRecord};
pub use timestamp::Timestamp;
pub use traffic::{BandwidthTotal, RateSummary, RxTx};

//! Shared primitives for the Skyhop VPN client core

pub mod clock;
pub mod country;
pub mod error;
pub mod feature;
pub mod protocol;
pub mod storage;
pub mod user;

pub use clock::{FakeClock, SystemClock, WallClock};
pub use country::CountryId;
pub use error::{ApiError, ApiResult, StorageError};
pub use feature::{ServerFeature, ServerFeatures};
pub use protocol::{ProtocolSelection, SmartProtocols, TransmissionProtocol, VpnProtocol};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, Storage};
pub use user::{has_access, VpnUser};

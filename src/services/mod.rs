pub mod connectivity;
pub mod context;
pub mod downloads;
pub mod position_store;

pub use connectivity::{
    ConnectivityEvent, ConnectivityResolver, ConnectivityState, NetworkCapabilities,
    NetworkMonitor, RegistrationId, format_bytes,
};
pub use context::{ConnectionContext, StaticConnectionContext};
pub use downloads::{DownloadInventory, FileDownloadInventory};
pub use position_store::{
    FilePositionStore, MemoryPositionStore, PlaybackProgress, PositionStore,
};

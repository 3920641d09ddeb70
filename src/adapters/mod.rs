// Adapters layer: concrete implementations for external systems (storage, http services).

pub mod jsoc;
pub mod solar_monitor;
pub mod storage;

pub use jsoc::JsocClient;
pub use storage::LocalStorage;

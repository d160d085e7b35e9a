pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod storage;
pub mod store;
#[cfg(test)]
pub mod test_helpers;
pub mod transport;

//! Agent state

pub mod app_state;
pub mod log_hub;
pub mod run_store;

pub use app_state::{get_shutdown_token, trigger_shutdown, AppState};
pub use log_hub::LogHub;
pub use run_store::RunStore;

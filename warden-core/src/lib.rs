pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod sample_store;
pub mod settings;
pub mod specdiff;
pub mod store;
pub mod webhook;

pub use config::WardenConfig;
pub use error::WardenError;
pub use sample_store::BoundedSampleStore;
pub use settings::{AnalysisSettings, SettingsCache, SettingsSource, StaticSettingsSource};
pub use specdiff::{NoopSpecDiffer, SpecDiffer};
pub use store::{EndpointActivity, PgStore, StoreTxn, WardenStore};
pub use webhook::{
    create_dispatcher, AlertDispatcher, DispatchError, HttpAlertDispatcher, NoopDispatcher,
};

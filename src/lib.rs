pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod meta;
pub mod remote;
pub mod scan;
pub mod tasks {
    pub mod keys;
    pub mod manager;
    pub mod queue;
    pub mod reconcile;
    pub mod settings;
    pub mod viewer;
}

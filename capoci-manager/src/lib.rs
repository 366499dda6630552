pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod helpers;
pub mod reconciler;
pub mod scope;
pub mod store;

pub fn configure_logger() {
    env_logger::builder()
        .default_format()
        .format_module_path(false)
        .filter_level(log::LevelFilter::Info)
        .init()
}

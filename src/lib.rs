pub mod audio;
pub mod backends;
pub mod catalog;
pub mod config_loader;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod history;
pub mod service;

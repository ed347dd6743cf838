pub mod bench;
pub mod config;
pub mod context;
pub mod kv;
pub mod layout;
pub mod persist;
pub mod plot;
pub mod record;

pub mod api;
pub mod cache;
pub mod config_io;
pub mod http;
pub mod lock;
pub mod paths;
pub mod session;

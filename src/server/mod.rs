pub mod builder;
mod conn;
pub mod listener;
pub mod signal;
mod tls;

pub use builder::{
    HttpServer, RemoteAddr, ServerBuilder, DEFAULT_IDLE_TIMEOUT, DEFAULT_READ_HEADER_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};
pub use conn::Connection;
pub use signal::shutdown_signal;

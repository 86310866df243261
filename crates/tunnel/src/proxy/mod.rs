pub mod connection;
pub mod transport;

pub use connection::ProxyConnection;
pub use transport::{ClientEnd, SshClientEnd};

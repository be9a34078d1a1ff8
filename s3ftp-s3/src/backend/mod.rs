//! FTP backend: the session every request goes through, and its transports

mod ftp;
mod memory;
pub mod path;
mod session;
mod traits;


pub use ftp::{FtpConnector, FtpSettings};
pub use memory::{FaultPoint, MemoryConnection, MemoryConnector, MemoryFtp};
pub use session::BackendSession;
pub use traits::{BackendEntry, BackendError, Connector, FtpConnection};

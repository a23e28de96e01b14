pub mod data;
pub mod io;
pub mod translate;

pub use data::{RawServerConfig, ServerConnection, ServersFile};
pub use io::{load_servers_file, ConfigError};
pub use translate::translate;

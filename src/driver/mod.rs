pub mod chrome;
pub mod connection;
pub mod scripts;
pub mod session;

pub use self::session::{Browser, MonitorSession};

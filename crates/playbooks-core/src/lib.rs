pub mod api_key;
pub mod canvas;
pub mod config;
pub mod error;
pub mod export;
pub mod io;
pub mod markdown;
pub mod mcp_server;
pub mod memory;
pub mod paths;
pub mod persona;
pub mod playbook;
pub mod schema;
pub mod session;
pub mod skill;
pub mod store;

pub use error::{PlaybookError, Result};
pub use store::Store;

//! Client for the Sony Ci media cloud REST API.
//!
//! The client signs in with the OAuth2 password grant, caches the access
//! token until it is explicitly invalidated, rewrites snake_case
//! parameter names to the lowerCamelCase Ci expects, and maps transport
//! and HTTP failures onto a single [`Error`] type whose [`ErrorKind`]
//! callers can branch on.
//!
//! ```no_run
//! use sonyci::{Client, Config};
//!
//! # async fn demo() -> Result<(), sonyci::Error> {
//! let config = Config {
//!     username: "ingest@example.com".into(),
//!     password: "secret".into(),
//!     client_id: "f00f".into(),
//!     client_secret: "b4b4".into(),
//!     workspace_id: None,
//! };
//!
//! let mut client = Client::new(config)?;
//! for workspace in client.workspaces(&()).await? {
//!     println!("{}", workspace.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod client;
pub mod config;
pub mod error;
mod params;
pub mod upload;
pub mod workspaces;

pub use client::{ApiResponse, Client, Endpoint, API_BASE_URL, UPLOAD_BASE_URL};
pub use config::Config;
pub use error::{Error, ErrorKind};
pub use workspaces::{NetworkRef, Workspace};

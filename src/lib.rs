//! cloud_drive - A client for the Amazon Cloud Drive REST API.
//!
//! This library provides functionality to:
//! - List nodes (files and folders), page by page or all at once
//! - Resolve children by name and walk folder paths
//! - Upload and download file content
//! - Read account status, quota and usage
//!
//! # Example
//!
//! ```no_run
//! use cloud_drive::{Authenticator, CloudDriveClient, Endpoints};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("credentials.json")?;
//!     let client = CloudDriveClient::new(auth, Endpoints::default());
//!
//!     let nodes = client.nodes();
//!     let root = nodes.get_root().await?;
//!     let walk = nodes.walk(&root, &["Pictures", "2014"]).await?;
//!     println!("{}", walk.node);
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod nodes;

// Re-exports for convenience
pub use account::AccountService;
pub use auth::Authenticator;
pub use client::CloudDriveClient;
pub use config::Endpoints;
pub use error::{DriveError, Incomplete, Result};
pub use models::{File, Folder, Node, NodeKind, TypedNode};
pub use nodes::{Cursor, ListOptions, NodesService, Page, Walk};

//! Staged self-update tool for the movie catalog bot.
//!
//! The updater keeps a long-running deployment current from a remote
//! version catalog without touching anything the operator cares about:
//! secrets, databases and user data are excluded from both backup and
//! overlay, a full snapshot is taken before the first mutation, and the
//! actual installation is performed by a short-lived orchestrator
//! process so the application's own files can be replaced freely.
//!
//! # Architecture
//!
//! - **Discovery** ([`catalog`]): resolve the newest published version
//!   from a JSON manifest or an HTML autoindex listing, with retries and
//!   a last-known-good cache.
//! - **Staging** ([`stage`]): materialize the payload locally, either by
//!   downloading and checksum-verifying an archive or by mirroring a
//!   remote directory tree with traversal-safe names.
//! - **Plan** ([`plan`]): the self-contained JSON contract handed from
//!   the host to the orchestrator.
//! - **Orchestration** ([`orchestrator`]): lock, backup, dependencies,
//!   overlay, delete-list, version bump, post-install, relaunch, cleanup.
//!
//! # Example
//!
//! ```no_run
//! use moviebot_updater::catalog::{Fetcher, RemoteCatalog};
//! use moviebot_updater::version::VersionId;
//!
//! # async fn example() {
//! let catalog = RemoteCatalog::new(Fetcher::default());
//! let check = catalog
//!     .check("https://releases.example.com/versions/", VersionId::parse("v1.0.0"))
//!     .await;
//! if check.available {
//!     println!("update to {} available", check.latest.unwrap());
//! }
//! # }
//! ```

pub mod apply;
pub mod backup;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod lock;
pub mod orchestrator;
pub mod plan;
pub mod stage;
pub mod store;
pub mod utils;
pub mod version;

pub use crate::core::{UpdaterError, display_error};

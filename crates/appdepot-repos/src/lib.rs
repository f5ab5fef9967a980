//! Product providers, repositories and catalog synchronization
//!
//! Aggregates heterogeneous product sources into one deduplicated,
//! compatibility-annotated catalog:
//!
//! - [`repository`]: an index file parsed into product records
//! - [`provider`]: the provider contract plus the shared repository cache
//! - [`bundled`], [`filesystem`], [`remote`], [`sideloaded`]: the four
//!   provider implementations, in registration (and precedence) order
//! - [`registry`]: cross-provider catalog, dedup and install routing
//! - [`sync`]: the sequential rebuild pass with bounded progress

pub mod bundle;
pub mod bundled;
pub mod download;
pub mod fetch;
pub mod filesystem;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod repository;
pub mod sideloaded;
pub mod sync;

pub use bundled::BundledProvider;
pub use download::DownloadManager;
pub use fetch::{Credentials, CredentialStore, FetchOutcome, HttpFetcher, IndexFetcher, NoCredentials};
pub use filesystem::FileSystemProvider;
pub use provider::ProductProvider;
pub use registry::{LogNotifier, Notifier, ProviderRegistry, StartupAction};
pub use remote::RemoteProvider;
pub use repository::{Repository, RepositoryType};
pub use sideloaded::SideloadedProvider;
pub use sync::{CancelToken, SyncOutcome};

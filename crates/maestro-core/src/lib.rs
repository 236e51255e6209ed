pub mod agents;
pub mod backup;
pub mod config;
pub mod conflict;
pub mod doctor;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod installer;
pub mod io;
pub mod lock;
pub mod paths;
pub mod writer;

pub use conflict::ConflictDecision;
pub use error::{MaestroError, Result, Stage};
pub use fetch::{AssetFetcher, ContentMap};
pub use installer::{install_required_assets, InstallResult};

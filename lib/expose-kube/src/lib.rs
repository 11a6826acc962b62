//! Kubernetes integration for the expose controller
pub mod store;
pub mod watcher;

pub use store::KubeStore;
pub use watcher::{DeploymentWatcher, SnapshotCache};

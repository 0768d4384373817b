//! Hit-delay profile storage and registry

pub mod document;
pub mod profile;
pub mod profiles;
pub mod storage;

pub use profile::HitDelayProfile;
pub use profiles::{LoadSummary, ProfileError, ProfileStore};
pub use storage::{JsonFileStorage, ProfileStorage};

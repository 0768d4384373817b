//! Hit-delay profile definition

use serde::Serialize;

use super::profiles::ProfileError;

/// Name of the profile that must always exist in the registry
pub const DEFAULT_PROFILE: &str = "default";

/// Delay applied when a document entry omits it, and by the fallback default profile
pub const DEFAULT_DELAY_MILLIS: u64 = 500;

/// Named minimum interval between two allowed attacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HitDelayProfile {
    name: String,
    /// Minimum spacing between allowed hits (milliseconds)
    #[serde(rename = "hitDelay")]
    pub delay_millis: u64,
    /// When false the profile never throttles
    pub enabled: bool,
}

impl HitDelayProfile {
    /// Build a profile, rejecting blank names
    pub fn new(
        name: impl Into<String>,
        delay_millis: u64,
        enabled: bool,
    ) -> Result<Self, ProfileError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProfileError::InvalidName);
        }

        Ok(Self {
            name,
            delay_millis,
            enabled,
        })
    }

    /// In-memory `default` profile used when the registry has none
    pub fn fallback_default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            delay_millis: DEFAULT_DELAY_MILLIS,
            enabled: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cooldown this profile enforces, or `None` when it never throttles
    pub fn effective_delay(&self) -> Option<u64> {
        self.enabled.then_some(self.delay_millis)
    }
}

/// Profiles written on first start when no document exists
pub fn seeded_profiles() -> Vec<HitDelayProfile> {
    [
        (DEFAULT_PROFILE, DEFAULT_DELAY_MILLIS),
        ("combo", 0),
        ("fast", 250),
        ("slow", 1000),
    ]
    .into_iter()
    .map(|(name, delay_millis)| HitDelayProfile {
        name: name.to_string(),
        delay_millis,
        enabled: true,
    })
    .collect()
}

//! The club dashboard widgets: schema, hard-coded seed, and default analytics per widget.
//!
//! Every widget reseeds from its seed on open; nothing here persists.

use std::fmt::{Display, Formatter};

use scenario_kernel_core::{
    DerivationProfile, EngineError, RecordDraft, ScenarioEngine, Schema,
};
use serde::{Deserialize, Serialize};

pub mod athletes;
pub mod compliance;
pub mod kpis;
pub mod talent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    Athletes,
    Kpis,
    Compliance,
    Talent,
}

impl Widget {
    pub const ALL: [Widget; 4] = [Self::Athletes, Self::Kpis, Self::Compliance, Self::Talent];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Athletes => "athletes",
            Self::Kpis => "kpis",
            Self::Compliance => "compliance",
            Self::Talent => "talent",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "athletes" => Some(Self::Athletes),
            "kpis" => Some(Self::Kpis),
            "compliance" => Some(Self::Compliance),
            "talent" => Some(Self::Talent),
            _ => None,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Athletes => "Squad readiness: sleep, freshness and mood rolled into a daily tier",
            Self::Kpis => "Club KPI board: progress against target per department",
            Self::Compliance => "Compliance tracker: weakest control decides the risk tier",
            Self::Talent => "Talent pipeline: six-axis retention profile with radar geometry",
        }
    }

    /// # Errors
    /// Returns [`EngineError::Validation`] if the built-in schema declaration is inconsistent.
    pub fn schema(self) -> Result<Schema, EngineError> {
        match self {
            Self::Athletes => athletes::schema(),
            Self::Kpis => kpis::schema(),
            Self::Compliance => compliance::schema(),
            Self::Talent => talent::schema(),
        }
    }

    #[must_use]
    pub fn seed(self) -> Vec<RecordDraft> {
        match self {
            Self::Athletes => athletes::seed(),
            Self::Kpis => kpis::seed(),
            Self::Compliance => compliance::seed(),
            Self::Talent => talent::seed(),
        }
    }

    #[must_use]
    pub fn profile(self) -> DerivationProfile {
        match self {
            Self::Athletes => athletes::profile(),
            Self::Kpis => kpis::profile(),
            Self::Compliance => compliance::profile(),
            Self::Talent => talent::profile(),
        }
    }

    /// Open a fresh engine over the widget's seed with its default profile.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] if the built-in schema or seed is malformed.
    pub fn open(self) -> Result<ScenarioEngine, EngineError> {
        self.open_with_profile(self.profile())
    }

    /// Open a fresh engine with a caller-supplied profile (e.g. loaded from a config file).
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] if the profile, schema, or seed is malformed.
    pub fn open_with_profile(
        self,
        profile: DerivationProfile,
    ) -> Result<ScenarioEngine, EngineError> {
        profile.validate()?;
        ScenarioEngine::new(self.schema()?, self.seed(), profile)
    }
}

impl Display for Widget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

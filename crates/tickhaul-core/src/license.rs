use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_source::ProviderId;
use crate::error::ValidationError;

/// Declared purpose of a dataset request. Used only to evaluate licensing
/// policy, never to alter fetch mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntendedUse {
    PrivateResearch,
    Redistribute,
    Commercial,
}

impl IntendedUse {
    pub const ALL: [Self; 3] = [Self::PrivateResearch, Self::Redistribute, Self::Commercial];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrivateResearch => "private_research",
            Self::Redistribute => "redistribute",
            Self::Commercial => "commercial",
        }
    }
}

impl Display for IntendedUse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntendedUse {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "private_research" => Ok(Self::PrivateResearch),
            "redistribute" => Ok(Self::Redistribute),
            "commercial" => Ok(Self::Commercial),
            other => Err(ValidationError::InvalidIntendedUse {
                value: other.to_owned(),
            }),
        }
    }
}

/// Result of the licensing gate. Computed once per request, before any
/// adapter is invoked, and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseDecision {
    Allowed,
    Denied(LicenseDenial),
}

/// A policy violation. Distinct from validation and provider failures;
/// always fatal to the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("licensing policy denies intended use '{intended_use}' for provider '{provider}': {reason}")]
pub struct LicenseDenial {
    pub provider: ProviderId,
    pub intended_use: IntendedUse,
    pub reason: String,
}

/// Immutable allow-matrix over (provider, intended use). The matrix is data,
/// not code: operators extend it with [`LicensePolicy::grant`] before the
/// pipeline runs; pipeline logic never consults ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePolicy {
    allowed: BTreeSet<(ProviderId, IntendedUse)>,
}

impl LicensePolicy {
    pub fn empty() -> Self {
        Self {
            allowed: BTreeSet::new(),
        }
    }

    /// Whitelists one (provider, intended use) combination.
    pub fn grant(&mut self, provider: ProviderId, intended_use: IntendedUse) {
        self.allowed.insert((provider, intended_use));
    }

    /// Pure decision function evaluated strictly before any provider I/O.
    pub fn decide(&self, provider: ProviderId, intended_use: IntendedUse) -> LicenseDecision {
        if self.allowed.contains(&(provider, intended_use)) {
            LicenseDecision::Allowed
        } else {
            LicenseDecision::Denied(LicenseDenial {
                provider,
                intended_use,
                reason: String::from("combination is not in the policy allow-matrix"),
            })
        }
    }
}

impl Default for LicensePolicy {
    /// The primary price provider permits every intended use; the
    /// supplementary exchange-statistics provider permits private research
    /// only.
    fn default() -> Self {
        let mut policy = Self::empty();
        for intended_use in IntendedUse::ALL {
            policy.grant(ProviderId::Primary, intended_use);
        }
        policy.grant(
            ProviderId::SupplementaryExchange,
            IntendedUse::PrivateResearch,
        );
        policy
    }
}

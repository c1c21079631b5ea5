//! Trust Classifier
//!
//! Tags each source as registry-tier (an official company register) or open-tier
//! (any other provider). Registry data is reliable for legal existence but often
//! wrong for customer-facing attributes such as trading name and category.

use crate::types::{Provenance, SourceTag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source tag prefix of the UK Companies House register
pub const COMPANIES_HOUSE_PREFIX: &str = "companies_house";

/// Trust tier of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTier {
    Registry,
    Open,
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTier::Registry => write!(f, "registry"),
            SourceTier::Open => write!(f, "open"),
        }
    }
}

/// Classifies source tags by case-insensitive prefix match
#[derive(Debug, Clone)]
pub struct TrustClassifier {
    registry_prefixes: Vec<String>,
}

impl TrustClassifier {
    /// Classifier with custom registry prefixes; blank prefixes are ignored
    pub fn new<I, S>(registry_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            registry_prefixes: registry_prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, tag: &SourceTag) -> SourceTier {
        let tag = tag.as_str().to_lowercase();
        if self
            .registry_prefixes
            .iter()
            .any(|prefix| tag.starts_with(prefix.as_str()))
        {
            SourceTier::Registry
        } else {
            SourceTier::Open
        }
    }

    /// Registry-tier if any contributing tag is registry-tier
    pub fn classify_provenance(&self, provenance: &Provenance) -> SourceTier {
        if provenance
            .iter()
            .any(|tag| self.classify(tag) == SourceTier::Registry)
        {
            SourceTier::Registry
        } else {
            SourceTier::Open
        }
    }
}

impl Default for TrustClassifier {
    fn default() -> Self {
        Self::new([COMPANIES_HOUSE_PREFIX])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classifies_companies_house() {
        let classifier = TrustClassifier::default();
        assert_eq!(
            classifier.classify(&SourceTag::new("companies_house_01234567")),
            SourceTier::Registry
        );
        assert_eq!(
            classifier.classify(&SourceTag::new("Companies_House_1")),
            SourceTier::Registry
        );
        assert_eq!(classifier.classify(&SourceTag::new("osm_42")), SourceTier::Open);
        assert_eq!(classifier.classify(&SourceTag::new("manual_entry")), SourceTier::Open);
    }

    #[test]
    fn test_prefix_not_substring() {
        let classifier = TrustClassifier::default();
        assert_eq!(
            classifier.classify(&SourceTag::new("yelp_companies_house_cafe")),
            SourceTier::Open
        );
    }

    #[test]
    fn test_custom_prefixes() {
        let classifier = TrustClassifier::new(["charity_register", " "]);
        assert_eq!(
            classifier.classify(&SourceTag::new("charity_register_9")),
            SourceTier::Registry
        );
        assert_eq!(
            classifier.classify(&SourceTag::new("companies_house_1")),
            SourceTier::Open
        );
    }

    #[test]
    fn test_provenance_is_registry_if_any_tag_is() {
        let classifier = TrustClassifier::default();
        let mut provenance = Provenance::new(SourceTag::new("osm_1"));
        assert_eq!(classifier.classify_provenance(&provenance), SourceTier::Open);

        provenance.push(SourceTag::new("companies_house_2"));
        assert_eq!(classifier.classify_provenance(&provenance), SourceTier::Registry);
    }
}

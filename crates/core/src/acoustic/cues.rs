//! Heuristic cue table mapping acoustic measurements to spoken-delivery cues.
//!
//! The thresholds are hand-tuned, not derived from data. They are plain serde
//! data so a deployment can ship its own table as JSON.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Above,
    Below,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tier {
    pub when: Comparison,
    pub threshold: f64,
    pub cue: String,
}

impl Tier {
    pub fn above(threshold: f64, cue: &str) -> Self {
        Self {
            when: Comparison::Above,
            threshold,
            cue: cue.to_owned(),
        }
    }

    pub fn below(threshold: f64, cue: &str) -> Self {
        Self {
            when: Comparison::Below,
            threshold,
            cue: cue.to_owned(),
        }
    }

    fn matches(&self, value: f64) -> bool {
        match self.when {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }
}

/// Ordered tiers; the first matching tier wins, `otherwise` applies when none match.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TierSet {
    pub tiers: Vec<Tier>,
    #[serde(default)]
    pub otherwise: Option<String>,
}

impl TierSet {
    pub fn select(&self, value: f64) -> Option<&str> {
        self.tiers
            .iter()
            .find(|t| t.matches(value))
            .map(|t| t.cue.as_str())
            .or(self.otherwise.as_deref())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnergyBands {
    pub high_above: f64,
    pub medium_above: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CueTable {
    /// Keyed on whole-buffer RMS.
    pub loudness: TierSet,
    /// Keyed on the coefficient of variation of segment RMS.
    pub variability: TierSet,
    /// Keyed on zero-crossing rate.
    pub pitch: TierSet,
    /// Keyed on peak absolute amplitude.
    pub transients: TierSet,
    pub energy: EnergyBands,
}

impl Default for CueTable {
    fn default() -> Self {
        Self {
            loudness: TierSet {
                tiers: vec![
                    Tier::above(3000.0, "speaking loudly (may be excited or agitated)"),
                    Tier::above(1500.0, "speaking at a normal volume"),
                    Tier::above(500.0, "speaking quietly (may be calm or subdued)"),
                ],
                otherwise: Some("speaking very quietly".to_owned()),
            },
            variability: TierSet {
                tiers: vec![
                    Tier::above(
                        0.6,
                        "vocal tone is highly variable (emotional, laughing or crying)",
                    ),
                    Tier::above(0.35, "vocal tone varies noticeably (lively speech)"),
                ],
                otherwise: Some("vocal tone is flat and monotone".to_owned()),
            },
            pitch: TierSet {
                tiers: vec![
                    Tier::above(0.15, "high-frequency content present (laughter or excitement)"),
                    Tier::below(0.05, "low-pitched, heavy delivery"),
                ],
                otherwise: None,
            },
            transients: TierSet {
                tiers: vec![Tier::above(
                    20000.0,
                    "sudden loud bursts (laughter, shouting or emphasis)",
                )],
                otherwise: None,
            },
            energy: EnergyBands {
                high_above: 2000.0,
                medium_above: 800.0,
            },
        }
    }
}

impl CueTable {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let table: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidCueTable(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sets = [
            ("loudness", &self.loudness),
            ("variability", &self.variability),
            ("pitch", &self.pitch),
            ("transients", &self.transients),
        ];
        for (name, set) in sets {
            if let Some(t) = set.tiers.iter().find(|t| !t.threshold.is_finite()) {
                return Err(ConfigError::InvalidCueTable(format!(
                    "{name}: non-finite threshold for cue {:?}",
                    t.cue
                )));
            }
        }
        if self.loudness.otherwise.is_none() || self.variability.otherwise.is_none() {
            return Err(ConfigError::InvalidCueTable(
                "loudness and variability must always yield a cue".to_owned(),
            ));
        }
        if !(self.energy.high_above.is_finite() && self.energy.medium_above.is_finite())
            || self.energy.medium_above > self.energy.high_above
        {
            return Err(ConfigError::InvalidCueTable(
                "energy bands must be finite with medium <= high".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loudness_tiers_keep_order() {
        let table = CueTable::default();
        assert_eq!(
            table.loudness.select(3500.0),
            Some("speaking loudly (may be excited or agitated)")
        );
        assert_eq!(table.loudness.select(3000.0), Some("speaking at a normal volume"));
        assert_eq!(
            table.loudness.select(600.0),
            Some("speaking quietly (may be calm or subdued)")
        );
        assert_eq!(table.loudness.select(500.0), Some("speaking very quietly"));
    }

    #[test]
    fn pitch_cue_is_optional_between_bounds() {
        let table = CueTable::default();
        assert!(table.pitch.select(0.1).is_none());
        assert_eq!(table.pitch.select(0.01), Some("low-pitched, heavy delivery"));
        assert!(table.pitch.select(0.2).unwrap().starts_with("high-frequency"));
    }

    #[test]
    fn table_loads_from_json() {
        let json = serde_json::to_string(&CueTable::default()).unwrap();
        let table = CueTable::from_json_str(&json).unwrap();
        assert_eq!(table, CueTable::default());
    }

    #[test]
    fn custom_threshold_changes_selection() {
        let mut table = CueTable::default();
        table.transients.tiers[0].threshold = 100.0;
        assert!(table.transients.select(150.0).is_some());
    }

    #[test]
    fn rejects_inverted_energy_bands() {
        let mut table = CueTable::default();
        table.energy.medium_above = 5000.0;
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("energy bands"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = CueTable::from_json_str("{\"loudness\": 3}").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCueTable(_)));
    }
}

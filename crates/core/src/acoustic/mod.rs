mod cues;

use serde::{Deserialize, Serialize};

pub use cues::{Comparison, CueTable, EnergyBands, Tier, TierSet};

pub const SAMPLE_RATE_HZ: u32 = 16_000;
/// Buffers (and analysis segments) need more than this many samples.
pub const MIN_SAMPLES: usize = 100;
pub const SEGMENT_SAMPLES: usize = (SAMPLE_RATE_HZ / 2) as usize;
pub const UNAVAILABLE_DESCRIPTION: &str = "analysis unavailable";
const CUE_SEPARATOR: &str = "; ";
const LOG_TARGET: &str = "acoustic";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AcousticFeatures {
    pub rms_energy: f64,
    pub peak_amplitude: u32,
    pub energy_cv: f64,
    pub zero_crossing_rate: f64,
    pub energy_level: EnergyLevel,
    pub cues: Vec<String>,
    pub description: String,
}

impl AcousticFeatures {
    /// Degraded feature set for undecodable or too-short audio.
    pub fn unavailable() -> Self {
        Self {
            rms_energy: 0.0,
            peak_amplitude: 0,
            energy_cv: 0.0,
            zero_crossing_rate: 0.0,
            energy_level: EnergyLevel::Unknown,
            cues: Vec::new(),
            description: UNAVAILABLE_DESCRIPTION.to_owned(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.energy_level != EnergyLevel::Unknown
    }

    /// Description worth forwarding to sentiment fusion, if any.
    pub fn voice_cues(&self) -> Option<&str> {
        self.is_available().then_some(self.description.as_str())
    }
}

/// Extracts loudness, dynamics and a pitch proxy from mono 16 kHz PCM.
#[derive(Clone, Debug, Default)]
pub struct AcousticFeatureExtractor {
    table: CueTable,
}

impl AcousticFeatureExtractor {
    pub fn new(table: CueTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CueTable {
        &self.table
    }

    pub fn extract(&self, samples: &[i16]) -> AcousticFeatures {
        if samples.len() < MIN_SAMPLES {
            tracing::debug!(
                target: LOG_TARGET,
                samples = samples.len(),
                "buffer too short for acoustic analysis"
            );
            return AcousticFeatures::unavailable();
        }

        let rms_energy = rms(samples);
        let peak_amplitude = peak(samples);
        let energy_cv = segment_energy_cv(samples);
        let zero_crossing_rate = zero_crossing_rate(samples);

        let cues: Vec<String> = [
            self.table.loudness.select(rms_energy),
            self.table.variability.select(energy_cv),
            self.table.pitch.select(zero_crossing_rate),
            self.table.transients.select(f64::from(peak_amplitude)),
        ]
        .into_iter()
        .flatten()
        .map(str::to_owned)
        .collect();

        let energy_level = self.energy_level(rms_energy);
        let description = cues.join(CUE_SEPARATOR);

        tracing::info!(
            target: LOG_TARGET,
            rms = rms_energy,
            cv = energy_cv,
            zcr = zero_crossing_rate,
            peak = peak_amplitude,
            level = ?energy_level,
            "acoustic features extracted"
        );

        AcousticFeatures {
            rms_energy,
            peak_amplitude,
            energy_cv,
            zero_crossing_rate,
            energy_level,
            cues,
            description,
        }
    }

    fn energy_level(&self, rms: f64) -> EnergyLevel {
        let bands = self.table.energy;
        if rms > bands.high_above {
            EnergyLevel::High
        } else if rms > bands.medium_above {
            EnergyLevel::Medium
        } else {
            EnergyLevel::Low
        }
    }
}

pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s);
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt()
}

pub fn peak(samples: &[i16]) -> u32 {
    samples
        .iter()
        .map(|&s| i32::from(s).unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// Standard deviation over mean of per-segment RMS; short trailing segments are dropped.
pub fn segment_energy_cv(samples: &[i16]) -> f64 {
    let energies: Vec<f64> = samples
        .chunks(SEGMENT_SAMPLES)
        .filter(|seg| seg.len() > MIN_SAMPLES)
        .map(rms)
        .collect();

    if energies.is_empty() {
        return 0.0;
    }

    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// Fraction of adjacent sample pairs whose sign differs (zero counts as positive).
pub fn zero_crossing_rate(samples: &[i16]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0) != (w[1] >= 0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

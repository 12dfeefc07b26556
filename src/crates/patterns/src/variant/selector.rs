//! Variant selection strategies

use crate::error::{PatternError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Picks one variant id for a request
pub trait VariantSelector: Send + Sync {
    fn select_variant(&self, pattern_name: &str, variants: &[String], session_id: &str)
        -> Result<String>;
}

fn ensure_variants(pattern_name: &str, variants: &[String]) -> Result<()> {
    if variants.is_empty() {
        return Err(PatternError::Variant(format!(
            "no variants available for pattern '{}'",
            pattern_name
        )));
    }
    Ok(())
}

/// Always picks the same variant
#[derive(Debug, Clone)]
pub struct ExplicitSelector {
    variant: String,
}

impl ExplicitSelector {
    pub fn new(variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
        }
    }
}

impl VariantSelector for ExplicitSelector {
    fn select_variant(
        &self,
        pattern_name: &str,
        variants: &[String],
        _session_id: &str,
    ) -> Result<String> {
        if variants.iter().any(|v| *v == self.variant) {
            Ok(self.variant.clone())
        } else {
            Err(PatternError::Variant(format!(
                "variant '{}' not available for pattern '{}' (have: {})",
                self.variant,
                pattern_name,
                variants.join(", ")
            )))
        }
    }
}

/// Deterministic per session: FNV-1a over session id and pattern name
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSelector;

impl HashSelector {
    pub fn new() -> Self {
        Self
    }
}

fn fnv1a(parts: &[&str]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for part in parts {
        for byte in part.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

impl VariantSelector for HashSelector {
    fn select_variant(
        &self,
        pattern_name: &str,
        variants: &[String],
        session_id: &str,
    ) -> Result<String> {
        ensure_variants(pattern_name, variants)?;
        let index = fnv1a(&[session_id, pattern_name]) % variants.len() as u64;
        Ok(variants[index as usize].clone())
    }
}

/// Uniform random choice
#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantSelector for RandomSelector {
    fn select_variant(
        &self,
        pattern_name: &str,
        variants: &[String],
        _session_id: &str,
    ) -> Result<String> {
        ensure_variants(pattern_name, variants)?;
        let index = self.rng.lock().gen_range(0..variants.len());
        Ok(variants[index].clone())
    }
}

/// Random choice proportional to relative integer weights
///
/// Variants without a weight are never picked. When no available variant
/// has a weight the choice is uniform.
#[derive(Debug)]
pub struct WeightedSelector {
    weights: HashMap<String, u32>,
    rng: Mutex<StdRng>,
}

impl WeightedSelector {
    pub fn new(weights: HashMap<String, u32>) -> Self {
        Self {
            weights,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reseed for reproducible draws
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            weights: self.weights,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn weights(&self) -> &HashMap<String, u32> {
        &self.weights
    }
}

impl VariantSelector for WeightedSelector {
    fn select_variant(
        &self,
        pattern_name: &str,
        variants: &[String],
        _session_id: &str,
    ) -> Result<String> {
        ensure_variants(pattern_name, variants)?;

        let weighted: Vec<(&String, u32)> = variants
            .iter()
            .filter_map(|v| {
                self.weights
                    .get(v)
                    .copied()
                    .filter(|w| *w > 0)
                    .map(|w| (v, w))
            })
            .collect();
        let total: u32 = weighted.iter().map(|(_, w)| w).sum();

        let mut rng = self.rng.lock();
        if total == 0 {
            let index = rng.gen_range(0..variants.len());
            return Ok(variants[index].clone());
        }

        let mut roll = rng.gen_range(0..total);
        for (variant, weight) in weighted {
            if roll < weight {
                return Ok(variant.clone());
            }
            roll -= weight;
        }
        Err(PatternError::Variant(format!(
            "weighted selection failed for pattern '{}'",
            pattern_name
        )))
    }
}

/// Two-arm weighted selector sending `treatment_fraction` of traffic to
/// `treatment`
///
/// The fraction is clamped to `[0, 1]` and resolved to thousandths, so
/// `0.10` gives a 900/100 split.
pub fn new_canary_selector(
    control: impl Into<String>,
    treatment: impl Into<String>,
    treatment_fraction: f64,
) -> WeightedSelector {
    let fraction = if treatment_fraction.is_nan() {
        0.0
    } else {
        treatment_fraction.clamp(0.0, 1.0)
    };
    let treatment_weight = (fraction * 1000.0).round() as u32;

    let mut weights = HashMap::new();
    weights.insert(control.into(), 1000 - treatment_weight);
    weights.insert(treatment.into(), treatment_weight);
    WeightedSelector::new(weights)
}

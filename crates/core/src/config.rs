//! Simulation configuration, read from JSON.
//!
//! Every field has a default, so `{}` is a valid configuration. Unknown
//! fields are rejected to catch typos.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::genome::{Genome, MapType};
use crate::trait_model::{InterceptPolicy, TraitSpec};

/// Genome architecture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenomeConfig {
    pub ploidy: usize,
    pub n_chromosomes: usize,
    pub n_loci_per_chromosome: usize,
    pub map_type: MapType,
    /// Genetic length of each chromosome in cM.
    pub chromosome_length: f64,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            ploidy: 2,
            n_chromosomes: 10,
            n_loci_per_chromosome: 5,
            map_type: MapType::Random,
            chromosome_length: 100.0,
        }
    }
}

impl GenomeConfig {
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Genome> {
        Genome::new(
            self.ploidy,
            self.n_chromosomes,
            self.n_loci_per_chromosome,
            self.map_type,
            self.chromosome_length,
            rng,
        )
    }
}

/// Additive trait design and calibration targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraitConfig {
    pub n_qtl_per_chromosome: usize,
    pub effect_mean: f64,
    pub effect_variance: f64,
    pub target_variance: f64,
    pub target_mean: f64,
    pub intercept_policy: InterceptPolicy,
}

impl Default for TraitConfig {
    fn default() -> Self {
        Self {
            n_qtl_per_chromosome: 1,
            effect_mean: 0.0,
            effect_variance: 1.0,
            target_variance: 1.0,
            target_mean: 0.0,
            intercept_policy: InterceptPolicy::Provisional,
        }
    }
}

impl TraitConfig {
    /// Select QTL and draw raw effects for `genome`.
    pub fn spec<R: Rng + ?Sized>(&self, genome: &Genome, rng: &mut R) -> Result<TraitSpec> {
        TraitSpec::random(
            genome,
            self.n_qtl_per_chromosome,
            self.effect_mean,
            self.effect_variance,
            self.target_variance,
            self.target_mean,
            rng,
        )
    }
}

/// A complete breeding-program run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Seed of the run's random source.
    pub seed: u64,
    pub genome: GenomeConfig,
    #[serde(rename = "trait")]
    pub trait_config: TraitConfig,
    pub n_founders: usize,
    pub n_generations: usize,
    /// Parents kept by truncation selection each generation.
    pub n_selected: usize,
    /// Progeny produced by random crossing each generation.
    pub n_crosses: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            genome: GenomeConfig::default(),
            trait_config: TraitConfig::default(),
            n_founders: 100,
            n_generations: 5,
            n_selected: 20,
            n_crosses: 100,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check cross-field constraints not covered by genome construction.
    pub fn validate(&self) -> Result<()> {
        if self.n_founders < 2 {
            return Err(SimError::InvalidConfiguration(format!(
                "Trait calibration needs at least 2 founders, got {}",
                self.n_founders
            )));
        }
        if self.trait_config.n_qtl_per_chromosome > self.genome.n_loci_per_chromosome {
            return Err(SimError::InvalidConfiguration(format!(
                "{} QTL per chromosome exceeds {} loci per chromosome",
                self.trait_config.n_qtl_per_chromosome, self.genome.n_loci_per_chromosome
            )));
        }
        if self.n_generations > 0 {
            if self.n_selected == 0 || self.n_crosses == 0 {
                return Err(SimError::InvalidConfiguration(
                    "Each generation needs at least one selected parent and one cross".into(),
                ));
            }
            if self.n_selected > self.n_founders || self.n_selected > self.n_crosses {
                return Err(SimError::InvalidConfiguration(format!(
                    "Cannot select {} parents from {} founders or {} progeny",
                    self.n_selected, self.n_founders, self.n_crosses
                )));
            }
        }
        Ok(())
    }
}

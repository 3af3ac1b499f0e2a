use ndarray::Array3;
use rand::Rng;

use crate::error::{Result, SimError};
use crate::genome::{Genome, GenomeShape};
use crate::types::Haplotypes;

/// A single member of a breeding population.
///
/// Owns one haplotype array of shape `(ploidy, n_chromosomes,
/// n_loci_per_chromosome)` with allele indicators in `{0, 1}`. Haplotypes are
/// fixed at construction. Parent ids are recorded for lineage only; an
/// individual does not own its parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    id: Option<String>,
    mother_id: Option<String>,
    father_id: Option<String>,
    haplotypes: Haplotypes,
    /// Trait-indexed breeding values, set externally.
    breeding_values: Option<Vec<f64>>,
    /// Trait-indexed phenotypes, set externally.
    phenotypes: Option<Vec<f64>>,
}

impl Individual {
    /// Wrap a haplotype array, validating its shape and allele coding.
    ///
    /// # Errors
    ///
    /// * `SimError::ShapeError` if `haplotypes` does not match `shape`.
    /// * `SimError::InvalidConfiguration` if an allele is not 0 or 1.
    pub fn new(shape: &GenomeShape, haplotypes: Haplotypes, id: Option<String>) -> Result<Self> {
        shape.check_haplotypes(haplotypes.shape(), "individual haplotypes")?;
        if let Some(&bad) = haplotypes.iter().find(|&&a| a > 1) {
            return Err(SimError::InvalidConfiguration(format!(
                "Allele indicators must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self {
            id,
            mother_id: None,
            father_id: None,
            haplotypes,
            breeding_values: None,
            phenotypes: None,
        })
    }

    /// Draw every allele independently and uniformly from `{0, 1}`.
    pub fn random<R: Rng + ?Sized>(genome: &Genome, id: Option<String>, rng: &mut R) -> Self {
        let haplotypes = Array3::from_shape_simple_fn(genome.shape().dims(), || rng.gen_range(0..=1u8));
        Self {
            id,
            mother_id: None,
            father_id: None,
            haplotypes,
            breeding_values: None,
            phenotypes: None,
        }
    }

    /// Record the parents of this individual.
    pub fn with_parents(mut self, mother_id: Option<String>, father_id: Option<String>) -> Self {
        self.mother_id = mother_id;
        self.father_id = father_id;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn mother_id(&self) -> Option<&str> {
        self.mother_id.as_deref()
    }

    pub fn father_id(&self) -> Option<&str> {
        self.father_id.as_deref()
    }

    /// Haplotypes with shape `(ploidy, n_chromosomes, n_loci_per_chromosome)`.
    pub fn haplotypes(&self) -> &Haplotypes {
        &self.haplotypes
    }

    pub fn breeding_values(&self) -> Option<&[f64]> {
        self.breeding_values.as_deref()
    }

    pub fn set_breeding_values(&mut self, values: Vec<f64>) {
        self.breeding_values = Some(values);
    }

    pub fn phenotypes(&self) -> Option<&[f64]> {
        self.phenotypes.as_deref()
    }

    pub fn set_phenotypes(&mut self, values: Vec<f64>) {
        self.phenotypes = Some(values);
    }
}

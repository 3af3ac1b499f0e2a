use ndarray::Array2;
use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Result, SimError};
use crate::genome::Genome;
use crate::types::{Effects, QtlMap};

/// Choose `n_qtl_per_chromosome` distinct loci per chromosome, uniformly
/// without replacement.
///
/// Returns a boolean map of shape `(n_chromosomes, n_loci_per_chromosome)`
/// with exactly `n_qtl_per_chromosome` marks in every row.
///
/// # Errors
///
/// `SimError::InvalidConfiguration` if more QTL are requested than a
/// chromosome has loci.
pub fn select_qtl<R: Rng + ?Sized>(
    n_qtl_per_chromosome: usize,
    genome: &Genome,
    rng: &mut R,
) -> Result<QtlMap> {
    let n_loci = genome.n_loci_per_chromosome();
    if n_qtl_per_chromosome > n_loci {
        return Err(SimError::InvalidConfiguration(format!(
            "Cannot place {} QTL on a chromosome with {} loci",
            n_qtl_per_chromosome, n_loci
        )));
    }

    let mut qtl_map = Array2::from_elem((genome.n_chromosomes(), n_loci), false);
    for mut row in qtl_map.outer_iter_mut() {
        for locus in index::sample(rng, n_loci, n_qtl_per_chromosome) {
            row[locus] = true;
        }
    }
    Ok(qtl_map)
}

/// Draw one normal effect per QTL; every non-QTL locus gets exactly 0.
///
/// Effects are assigned to QTL in row-major (chromosome, locus) order.
///
/// # Errors
///
/// `SimError::InvalidConfiguration` for a negative or non-finite variance.
pub fn generate_effects<R: Rng + ?Sized>(
    qtl_map: &QtlMap,
    mean: f64,
    variance: f64,
    rng: &mut R,
) -> Result<Effects> {
    if !(variance.is_finite() && variance >= 0.0) || !mean.is_finite() {
        return Err(SimError::InvalidConfiguration(format!(
            "Effect distribution needs a finite mean and non-negative variance, got N({}, {})",
            mean, variance
        )));
    }
    let normal = Normal::new(mean, variance.sqrt())
        .map_err(|e| SimError::InvalidConfiguration(format!("Effect distribution: {}", e)))?;

    let mut effects = Array2::zeros(qtl_map.raw_dim());
    for (effect, &is_qtl) in effects.iter_mut().zip(qtl_map.iter()) {
        if is_qtl {
            *effect = normal.sample(rng);
        }
    }
    Ok(effects)
}

/// An uncalibrated additive trait: QTL positions, raw effects and the
/// variance and mean the calibrated trait should reach in the founders.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitSpec {
    qtl_map: QtlMap,
    additive_effects: Effects,
    target_variance: f64,
    target_mean: f64,
}

impl TraitSpec {
    /// # Errors
    ///
    /// * `SimError::ShapeError` if the QTL map and effects differ in shape.
    /// * `SimError::InvalidConfiguration` for a negative or non-finite target
    ///   variance or a non-finite target mean.
    pub fn new(
        qtl_map: QtlMap,
        additive_effects: Effects,
        target_variance: f64,
        target_mean: f64,
    ) -> Result<Self> {
        if qtl_map.shape() != additive_effects.shape() {
            return Err(SimError::ShapeError {
                expected: qtl_map.shape().to_vec(),
                got: additive_effects.shape().to_vec(),
                context: "additive effects vs QTL map".into(),
            });
        }
        if !(target_variance.is_finite() && target_variance >= 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "Target genetic variance must be non-negative, got {}",
                target_variance
            )));
        }
        if !target_mean.is_finite() {
            return Err(SimError::InvalidConfiguration(format!(
                "Target mean must be finite, got {}",
                target_mean
            )));
        }
        Ok(Self {
            qtl_map,
            additive_effects,
            target_variance,
            target_mean,
        })
    }

    /// Select QTL and draw their effects in one step.
    pub fn random<R: Rng + ?Sized>(
        genome: &Genome,
        n_qtl_per_chromosome: usize,
        effect_mean: f64,
        effect_variance: f64,
        target_variance: f64,
        target_mean: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let qtl_map = select_qtl(n_qtl_per_chromosome, genome, rng)?;
        let effects = generate_effects(&qtl_map, effect_mean, effect_variance, rng)?;
        Self::new(qtl_map, effects, target_variance, target_mean)
    }

    pub fn qtl_map(&self) -> &QtlMap {
        &self.qtl_map
    }

    pub fn additive_effects(&self) -> &Effects {
        &self.additive_effects
    }

    pub fn target_variance(&self) -> f64 {
        self.target_variance
    }

    pub fn target_mean(&self) -> f64 {
        self.target_mean
    }

    pub(crate) fn into_parts(self) -> (QtlMap, Effects, f64, f64) {
        (self.qtl_map, self.additive_effects, self.target_variance, self.target_mean)
    }
}

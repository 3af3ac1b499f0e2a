use log::debug;
use ndarray::{Array1, Array4, ArrayView2, ArrayView3, ArrayView4, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::genome::{Genome, GenomeShape};
use crate::types::{Allele, Effects, QtlMap};

use super::design::TraitSpec;
use super::variance::sample_variance;

/// Batch size above which genetic values are computed in parallel.
const PARALLEL_THRESHOLD: usize = 256;

/// Which intercept the calibrated trait keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptPolicy {
    /// Keep the intercept fitted with the unscaled effects. The founder mean
    /// then drifts from the target by `(factor - 1) * mean(raw values)`.
    ///
    /// Raw values use the centred coding of [`scaled_dosages`], not 0/1
    /// allele counts, so for diploids the intercept sits `2 * sum(effects)`
    /// above one fitted on allele counts.
    #[default]
    Provisional,
    /// Refit the intercept after scaling so the founder mean hits the target.
    Recalibrated,
}

/// A calibrated additive trait.
///
/// Genetic value of an individual:
///
/// ```text
/// g = intercept + sum_{k,c,l} (x_kcl - ploidy/2) * (2/ploidy) * a_cl
/// ```
///
/// where `x_kcl` is the allele indicator on copy k and `a` the scaled
/// effects. Effects are scaled once, against a founder population, so that
/// the founders' genetic values have sample variance `target_variance`.
/// The trait is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveTrait {
    shape: GenomeShape,
    qtl_map: QtlMap,
    additive_effects: Effects,
    target_variance: f64,
    target_mean: f64,
    intercept: f64,
    initial_variance: f64,
    scaling_factor: f64,
    policy: InterceptPolicy,
}

impl AdditiveTrait {
    /// Calibrate a [`TraitSpec`] against founder genotypes `(n, ploidy, chr, loci)`.
    ///
    /// 1. The provisional intercept is `target_mean - mean(raw values)`,
    ///    raw values being computed with the unscaled effects and no intercept.
    /// 2. `initial_variance` is the sample variance of the founders' genetic
    ///    values under the provisional trait.
    /// 3. Effects are multiplied by `sqrt(target_variance / initial_variance)`.
    /// 4. With [`InterceptPolicy::Recalibrated`] the intercept is refitted;
    ///    otherwise the provisional intercept is kept.
    ///
    /// # Errors
    ///
    /// * `SimError::ShapeError` if the trait design or founders do not match `genome`.
    /// * `SimError::EmptyPopulation` if there are no founders.
    /// * `SimError::DegenerateVariance` if the founders' genetic values have
    ///   zero (or undefined) variance.
    pub fn calibrate(
        spec: TraitSpec,
        genome: &Genome,
        founders: ArrayView4<Allele>,
        policy: InterceptPolicy,
    ) -> Result<Self> {
        let shape = genome.shape();
        shape.check_loci(spec.qtl_map().shape(), "QTL map")?;
        shape.check_loci(spec.additive_effects().shape(), "additive effects")?;
        shape.check_genotypes(founders.shape(), "founder genotypes")?;
        let n = founders.len_of(Axis(0));
        if n == 0 {
            return Err(SimError::EmptyPopulation(
                "trait calibration needs founder genotypes".into(),
            ));
        }

        let (qtl_map, additive_effects, target_variance, target_mean) = spec.into_parts();

        let raw = additive_values(founders, additive_effects.view(), shape.ploidy);
        let raw_mean = raw.mean().unwrap_or(0.0);

        let mut provisional = Self {
            shape,
            qtl_map,
            additive_effects,
            target_variance,
            target_mean,
            intercept: target_mean - raw_mean,
            initial_variance: f64::NAN,
            scaling_factor: 1.0,
            policy,
        };

        let initial = provisional.calculate_genetic_value(founders)?;
        let initial_variance = match sample_variance(&initial) {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(v) => {
                return Err(SimError::DegenerateVariance(format!(
                    "founder genetic values have variance {}",
                    v
                )))
            }
            None => {
                return Err(SimError::DegenerateVariance(format!(
                    "variance of {} founder genetic value(s) is undefined",
                    n
                )))
            }
        };

        let scaling_factor = (target_variance / initial_variance).sqrt();
        provisional.additive_effects *= scaling_factor;
        provisional.initial_variance = initial_variance;
        provisional.scaling_factor = scaling_factor;

        if policy == InterceptPolicy::Recalibrated {
            provisional.intercept = target_mean - scaling_factor * raw_mean;
        }

        debug!(
            "Calibrated additive trait on {} founders: initial variance {:.4}, scaling factor {:.4}, intercept {:.4}",
            n, initial_variance, scaling_factor, provisional.intercept
        );
        Ok(provisional)
    }

    /// Genetic values of a genotype batch `(n, ploidy, chr, loci)`, one per individual.
    ///
    /// # Errors
    ///
    /// `SimError::ShapeError` if the batch does not match the trait's genome.
    pub fn calculate_genetic_value(&self, genotypes: ArrayView4<Allele>) -> Result<Array1<f64>> {
        self.shape.check_genotypes(genotypes.shape(), "genetic value genotypes")?;
        let values = additive_values(genotypes, self.additive_effects.view(), self.shape.ploidy);
        Ok(values + self.intercept)
    }

    pub fn qtl_map(&self) -> &QtlMap {
        &self.qtl_map
    }

    /// Scaled additive effects; zero at non-QTL loci.
    pub fn additive_effects(&self) -> &Effects {
        &self.additive_effects
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn target_variance(&self) -> f64 {
        self.target_variance
    }

    pub fn target_mean(&self) -> f64 {
        self.target_mean
    }

    /// Founder genetic variance before scaling.
    pub fn initial_variance(&self) -> f64 {
        self.initial_variance
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    pub fn intercept_policy(&self) -> InterceptPolicy {
        self.policy
    }

    pub fn n_qtl(&self) -> usize {
        self.qtl_map.iter().filter(|&&q| q).count()
    }
}

impl TraitSpec {
    /// Shorthand for [`AdditiveTrait::calibrate`].
    pub fn calibrate(
        self,
        genome: &Genome,
        founders: ArrayView4<Allele>,
        policy: InterceptPolicy,
    ) -> Result<AdditiveTrait> {
        AdditiveTrait::calibrate(self, genome, founders, policy)
    }
}

/// Centered, scaled allele coding `(x - ploidy/2) * (2/ploidy)`, elementwise.
pub fn scaled_dosages(genotypes: ArrayView4<Allele>, ploidy: usize) -> Array4<f64> {
    let half = ploidy as f64 / 2.0;
    let scale = 2.0 / ploidy as f64;
    genotypes.mapv(|x| (f64::from(x) - half) * scale)
}

/// Sum of scaled allele codes times effects per individual, without intercept.
fn additive_values(genotypes: ArrayView4<Allele>, effects: ArrayView2<f64>, ploidy: usize) -> Array1<f64> {
    let half = ploidy as f64 / 2.0;
    let scale = 2.0 / ploidy as f64;
    let value = |individual: ArrayView3<Allele>| -> f64 {
        individual
            .outer_iter()
            .map(|copy| {
                Zip::from(&copy)
                    .and(&effects)
                    .fold(0.0, |acc, &x, &a| acc + (f64::from(x) - half) * scale * a)
            })
            .sum()
    };

    let n = genotypes.len_of(Axis(0));
    let values: Vec<f64> = if n >= PARALLEL_THRESHOLD {
        (0..n)
            .into_par_iter()
            .map(|i| value(genotypes.index_axis(Axis(0), i)))
            .collect()
    } else {
        genotypes.outer_iter().map(value).collect()
    };
    Array1::from(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, Axis};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::trait_model::design::{generate_effects, select_qtl};

    fn random_genotypes(shape: GenomeShape, n: usize, rng: &mut StdRng) -> Array4<u8> {
        let (p, c, l) = shape.dims();
        Array4::from_shape_simple_fn((n, p, c, l), || rng.gen_range(0..=1u8))
    }

    fn calibrated(policy: InterceptPolicy, seed: u64) -> (Genome, Array4<u8>, AdditiveTrait) {
        let genome = Genome::uniform(2, 5, 40, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let founders = random_genotypes(genome.shape(), 60, &mut rng);
        let spec = TraitSpec::random(&genome, 8, 0.0, 1.0, 3.0, 10.0, &mut rng).unwrap();
        let t = spec.calibrate(&genome, founders.view(), policy).unwrap();
        (genome, founders, t)
    }

    #[test]
    fn test_scaled_dosage_coding() {
        let g = Array4::from_shape_vec((1, 2, 1, 2), vec![0u8, 1, 1, 1]).unwrap();
        let diploid = scaled_dosages(g.view(), 2);
        assert_eq!(diploid.iter().copied().collect::<Vec<_>>(), vec![-1.0, 0.0, 0.0, 0.0]);

        let tetra = Array4::from_shape_vec((1, 4, 1, 1), vec![0u8, 1, 1, 1]).unwrap();
        let scaled = scaled_dosages(tetra.view(), 4);
        assert_eq!(scaled.iter().copied().collect::<Vec<_>>(), vec![-1.0, -0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_founder_variance_hits_target() {
        for policy in [InterceptPolicy::Provisional, InterceptPolicy::Recalibrated] {
            let (_, founders, t) = calibrated(policy, 21);
            let gv = t.calculate_genetic_value(founders.view()).unwrap();
            let var = sample_variance(&gv).unwrap();
            assert_relative_eq!(var, 3.0, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_provisional_intercept_mean_drift() {
        let genome = Genome::uniform(2, 5, 40, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let founders = random_genotypes(genome.shape(), 60, &mut rng);
        let spec = TraitSpec::random(&genome, 8, 0.0, 1.0, 3.0, 10.0, &mut rng).unwrap();
        let raw_mean = additive_values(founders.view(), spec.additive_effects().view(), 2)
            .mean()
            .unwrap();

        let t = spec.calibrate(&genome, founders.view(), InterceptPolicy::Provisional).unwrap();
        let mean = t.calculate_genetic_value(founders.view()).unwrap().mean().unwrap();
        assert_relative_eq!(t.intercept(), 10.0 - raw_mean, epsilon = 1e-9);
        assert_relative_eq!(mean, 10.0 + (t.scaling_factor() - 1.0) * raw_mean, epsilon = 1e-9);
    }

    #[test]
    fn test_provisional_intercept_uses_centred_coding() {
        let genome = Genome::uniform(2, 3, 4, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let founders = random_genotypes(genome.shape(), 10, &mut rng);
        let spec = TraitSpec::random(&genome, 1, 0.0, 1.0, 2.0, 5.0, &mut rng).unwrap();
        let raw_effects = spec.additive_effects().clone();

        let counts = founders.mapv(f64::from);
        let count_mean = (&counts * &raw_effects).sum() / 10.0;
        let centred_mean = (&scaled_dosages(founders.view(), 2) * &raw_effects).sum() / 10.0;

        let t = spec.calibrate(&genome, founders.view(), InterceptPolicy::Provisional).unwrap();
        assert_relative_eq!(t.intercept(), 5.0 - centred_mean, epsilon = 1e-9);
        assert_relative_eq!(
            t.intercept(),
            (5.0 - count_mean) + 2.0 * raw_effects.sum(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_recalibrated_intercept_hits_target_mean() {
        let (_, founders, t) = calibrated(InterceptPolicy::Recalibrated, 22);
        let mean = t.calculate_genetic_value(founders.view()).unwrap().mean().unwrap();
        assert_relative_eq!(mean, 10.0, epsilon = 1e-9);
        assert_eq!(t.intercept_policy(), InterceptPolicy::Recalibrated);
    }

    #[test]
    fn test_genetic_value_matches_explicit_formula() {
        let (genome, founders, t) = calibrated(InterceptPolicy::Provisional, 23);
        let gv = t.calculate_genetic_value(founders.view()).unwrap();

        let scaled = scaled_dosages(founders.view(), genome.ploidy());
        let weighted = &scaled * t.additive_effects();
        for (i, ind) in weighted.outer_iter().enumerate() {
            assert_relative_eq!(gv[i], ind.sum() + t.intercept(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_effects_stay_zero_off_qtl_after_scaling() {
        let (_, _, t) = calibrated(InterceptPolicy::Provisional, 24);
        assert_eq!(t.n_qtl(), 5 * 8);
        for (&a, &q) in t.additive_effects().iter().zip(t.qtl_map().iter()) {
            if !q {
                assert_eq!(a, 0.0);
            }
        }
        assert_relative_eq!(t.scaling_factor(), (3.0 / t.initial_variance()).sqrt());
    }

    #[test]
    fn test_parallel_genetic_values_match_serial() {
        let genome = Genome::uniform(2, 2, 10, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(25);
        let big = random_genotypes(genome.shape(), PARALLEL_THRESHOLD + 10, &mut rng);
        let effects = Array2::from_shape_simple_fn((2, 10), || rng.gen_range(-1.0..1.0));
        let all = additive_values(big.view(), effects.view(), 2);
        for i in [0, 7, PARALLEL_THRESHOLD + 9] {
            let one = big.select(Axis(0), &[i]);
            let single = additive_values(one.view(), effects.view(), 2);
            assert_relative_eq!(all[i], single[0], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_calibration_errors() {
        let genome = Genome::uniform(2, 2, 5, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(26);
        let qtl = select_qtl(2, &genome, &mut rng).unwrap();
        let effects = generate_effects(&qtl, 0.0, 1.0, &mut rng).unwrap();
        let spec = TraitSpec::new(qtl.clone(), effects.clone(), 1.0, 0.0).unwrap();

        let empty = Array4::<u8>::zeros((0, 2, 2, 5));
        assert!(matches!(
            spec.clone().calibrate(&genome, empty.view(), InterceptPolicy::Provisional),
            Err(SimError::EmptyPopulation(_))
        ));

        let single = random_genotypes(genome.shape(), 1, &mut rng);
        assert!(matches!(
            spec.clone().calibrate(&genome, single.view(), InterceptPolicy::Provisional),
            Err(SimError::DegenerateVariance(_))
        ));

        // Identical founders: zero variance.
        let clones = Array4::<u8>::ones((5, 2, 2, 5));
        assert!(matches!(
            spec.clone().calibrate(&genome, clones.view(), InterceptPolicy::Provisional),
            Err(SimError::DegenerateVariance(_))
        ));

        let wrong = Array4::<u8>::zeros((5, 2, 2, 6));
        assert!(matches!(
            spec.calibrate(&genome, wrong.view(), InterceptPolicy::Provisional),
            Err(SimError::ShapeError { .. })
        ));

        let other_genome = Genome::uniform(2, 3, 5, 100.0).unwrap();
        let spec = TraitSpec::new(qtl, effects, 1.0, 0.0).unwrap();
        let founders = random_genotypes(other_genome.shape(), 5, &mut rng);
        assert!(spec
            .calibrate(&other_genome, founders.view(), InterceptPolicy::Provisional)
            .is_err());
    }

    #[test]
    fn test_genetic_value_rejects_wrong_shape() {
        let (_, _, t) = calibrated(InterceptPolicy::Provisional, 27);
        let wrong = Array4::<u8>::zeros((3, 2, 5, 41));
        assert!(t.calculate_genetic_value(wrong.view()).is_err());
    }
}

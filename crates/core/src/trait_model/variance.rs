use ndarray::{Array1, ArrayView4};

use crate::error::{Result, SimError};
use crate::population::allele_frequencies;
use crate::types::{Allele, Effects};

/// Unbiased sample variance (n - 1 denominator). `None` for fewer than two values.
pub fn sample_variance(values: &Array1<f64>) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.var(1.0))
}

/// Expected additive genetic variance under Hardy-Weinberg equilibrium:
///
/// ```text
/// V_A = sum_j 2 * p_j * (1 - p_j) * a_j^2
/// ```
///
/// with `p_j` the allele frequency of locus j in `genotypes` and `a_j` its
/// effect. This is the diploid approximation; it ignores linkage
/// disequilibrium and the sample structure of the founders.
///
/// # Errors
///
/// * `SimError::EmptyPopulation` if `genotypes` has no individuals.
/// * `SimError::ShapeError` if `effects` does not match the locus axes.
pub fn expected_genetic_variance(genotypes: ArrayView4<Allele>, effects: &Effects) -> Result<f64> {
    let freqs = allele_frequencies(genotypes)?;
    if freqs.shape() != effects.shape() {
        return Err(SimError::ShapeError {
            expected: freqs.shape().to_vec(),
            got: effects.shape().to_vec(),
            context: "effects vs genotype loci".into(),
        });
    }
    let contributions = freqs.mapv(|p| 2.0 * p * (1.0 - p)) * effects.mapv(|a| a * a);
    Ok(contributions.sum())
}

use ndarray::Array2;

use crate::genome::Genome;

/// Per-locus switch probability used when the genome has no genetic map.
pub const UNMAPPED_SWITCH_PROBABILITY: f64 = 0.5;

/// Haldane map function: recombination fraction for a distance in cM.
///
/// ```text
/// r = 0.5 * (1 - exp(-2d / 100))
/// ```
pub fn haldane(distance_cm: f64) -> f64 {
    0.5 * (1.0 - (-2.0 * distance_cm.abs() / 100.0).exp())
}

/// Probability of switching parental copy when stepping onto each locus.
///
/// Entry `[chr, 0]` is 0 (the starting copy is drawn separately); entry
/// `[chr, j]` is the Haldane recombination fraction over the map interval
/// `(j-1, j]`. Unmapped genomes use [`UNMAPPED_SWITCH_PROBABILITY`] for every
/// interval.
pub fn crossover_probabilities(genome: &Genome) -> Array2<f64> {
    let dims = (genome.n_chromosomes(), genome.n_loci_per_chromosome());
    match genome.genetic_map() {
        Some(map) => Array2::from_shape_fn(dims, |(chr, locus)| {
            if locus == 0 {
                0.0
            } else {
                haldane(map[[chr, locus]] - map[[chr, locus - 1]])
            }
        }),
        None => Array2::from_shape_fn(dims, |(_, locus)| {
            if locus == 0 {
                0.0
            } else {
                UNMAPPED_SWITCH_PROBABILITY
            }
        }),
    }
}

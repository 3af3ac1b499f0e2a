use log::debug;
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayView4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{Result, SimError};
use crate::genome::Genome;
use crate::types::{Allele, Gametes};

use super::recombination::crossover_probabilities;

/// Batch size above which gametes are simulated in parallel.
const PARALLEL_THRESHOLD: usize = 32;

/// Simulate one haploid gamete per parent.
///
/// `parents` has shape `(n, ploidy, chr, loci)`; the result has shape
/// `(n, chr, loci)`. For every parent and chromosome the walk starts on a
/// uniformly drawn copy and, at each subsequent locus, switches to one of
/// the other `ploidy - 1` copies with the interval's recombination
/// probability. Chromosomes and parents are independent.
///
/// One seed per parent is drawn from `rng` up front, so the output does not
/// depend on whether the batch runs in parallel.
///
/// # Errors
///
/// `SimError::ShapeError` if `parents` does not match the genome.
pub fn simulate_gametes<R: Rng + ?Sized>(
    genome: &Genome,
    parents: ArrayView4<Allele>,
    rng: &mut R,
) -> Result<Gametes> {
    let shape = genome.shape();
    shape.check_genotypes(parents.shape(), "meiosis parents")?;
    let (n, ploidy, n_chr, n_loci) = parents.dim();

    // A haploid parent has nothing to recombine with.
    if ploidy == 1 {
        return Ok(parents.index_axis(Axis(1), 0).to_owned());
    }

    let probs = crossover_probabilities(genome);
    let seeds: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
    let run = |i: usize| meiosis(parents.index_axis(Axis(0), i), probs.view(), seeds[i]);

    let gametes: Vec<Vec<Allele>> = if n >= PARALLEL_THRESHOLD {
        debug!("Simulating {} gametes in parallel", n);
        (0..n).into_par_iter().map(run).collect()
    } else {
        (0..n).map(run).collect()
    };

    let flat: Vec<Allele> = gametes.into_iter().flatten().collect();
    let emitted = flat.len();
    Array3::from_shape_vec((n, n_chr, n_loci), flat).map_err(|e| SimError::ShapeError {
        expected: vec![n * n_chr * n_loci],
        got: vec![emitted],
        context: format!("gamete assembly: {}", e),
    })
}

/// Walk every chromosome of one parent, emitting the allele of the current copy.
fn meiosis(parent: ArrayView3<Allele>, probs: ArrayView2<f64>, seed: u64) -> Vec<Allele> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (ploidy, n_chr, n_loci) = parent.dim();
    let mut gamete = Vec::with_capacity(n_chr * n_loci);

    for chr in 0..n_chr {
        let mut copy = rng.gen_range(0..ploidy);
        for locus in 0..n_loci {
            if locus > 0 && rng.gen_bool(probs[[chr, locus]]) {
                copy = switch_copy(copy, ploidy, &mut rng);
            }
            gamete.push(parent[[copy, chr, locus]]);
        }
    }
    gamete
}

/// Pick one of the other `ploidy - 1` copies uniformly.
fn switch_copy<R: Rng + ?Sized>(current: usize, ploidy: usize, rng: &mut R) -> usize {
    let other = rng.gen_range(0..ploidy - 1);
    if other >= current {
        other + 1
    } else {
        other
    }
}

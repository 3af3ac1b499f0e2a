use ndarray::{ArrayView4, ArrayViewD, Ix4};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Allele;

/// Array-shape descriptor of a genome: (ploidy, n_chromosomes, n_loci_per_chromosome).
///
/// Every array crossing a public boundary is validated against this
/// descriptor. Batch arrays carry an extra leading axis of any length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeShape {
    pub ploidy: usize,
    pub n_chromosomes: usize,
    pub n_loci_per_chromosome: usize,
}

impl GenomeShape {
    pub fn new(ploidy: usize, n_chromosomes: usize, n_loci_per_chromosome: usize) -> Self {
        Self {
            ploidy,
            n_chromosomes,
            n_loci_per_chromosome,
        }
    }

    /// The (ploidy, n_chromosomes, n_loci_per_chromosome) triple.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.ploidy, self.n_chromosomes, self.n_loci_per_chromosome)
    }

    /// Number of loci on one genome copy.
    pub fn n_loci(&self) -> usize {
        self.n_chromosomes * self.n_loci_per_chromosome
    }

    /// Validate a single-individual haplotype shape `(ploidy, chr, loci)`.
    pub fn check_haplotypes(&self, got: &[usize], context: &str) -> Result<()> {
        let expected = [self.ploidy, self.n_chromosomes, self.n_loci_per_chromosome];
        check(&expected, got, context)
    }

    /// Validate a genotype batch shape `(n, ploidy, chr, loci)`.
    pub fn check_genotypes(&self, got: &[usize], context: &str) -> Result<()> {
        let n = got.first().copied().unwrap_or(0);
        let expected = [n, self.ploidy, self.n_chromosomes, self.n_loci_per_chromosome];
        check(&expected, got, context)
    }

    /// Validate a gamete batch shape `(n, chr, loci)`.
    pub fn check_gametes(&self, got: &[usize], context: &str) -> Result<()> {
        let n = got.first().copied().unwrap_or(0);
        let expected = [n, self.n_chromosomes, self.n_loci_per_chromosome];
        check(&expected, got, context)
    }

    /// Validate a per-locus array shape `(chr, loci)` such as a QTL map.
    pub fn check_loci(&self, got: &[usize], context: &str) -> Result<()> {
        let expected = [self.n_chromosomes, self.n_loci_per_chromosome];
        check(&expected, got, context)
    }
}

fn check(expected: &[usize], got: &[usize], context: &str) -> Result<()> {
    if expected != got {
        return Err(SimError::ShapeError {
            expected: expected.to_vec(),
            got: got.to_vec(),
            context: context.into(),
        });
    }
    Ok(())
}

/// View a dynamic-rank array as a genotype batch `(n, ploidy, chr, loci)`.
///
/// # Errors
///
/// `SimError::ShapeError` if the array is not rank 4 or its trailing axes do
/// not match `shape`.
pub fn as_genotype_batch<'a>(
    array: ArrayViewD<'a, Allele>,
    shape: &GenomeShape,
) -> Result<ArrayView4<'a, Allele>> {
    let got = array.shape().to_vec();
    let batch = array
        .into_dimensionality::<Ix4>()
        .map_err(|_| SimError::ShapeError {
            expected: vec![
                got.first().copied().unwrap_or(0),
                shape.ploidy,
                shape.n_chromosomes,
                shape.n_loci_per_chromosome,
            ],
            got: got.clone(),
            context: "genotype batch must be (n, ploidy, chr, loci)".into(),
        })?;
    shape.check_genotypes(batch.shape(), "genotype batch")?;
    Ok(batch)
}

use std::sync::Arc;

use ndarray::{Array2, Array3, Array4, ArrayView4, Axis};
use rand::Rng;

use crate::error::{Result, SimError};
use crate::genome::Genome;
use crate::types::Genotypes;

use super::individual::Individual;

/// An ordered collection of individuals sharing one genome.
///
/// Bulk quantities (genotypes, dosages, allele frequencies, diversity) are
/// computed on demand from the current membership and never cached.
/// Aggregations over an empty population fail with
/// `SimError::EmptyPopulation`.
#[derive(Debug, Clone)]
pub struct Population {
    id: Option<String>,
    genome: Arc<Genome>,
    individuals: Vec<Individual>,
}

impl Population {
    /// Create an empty population.
    pub fn new(genome: Arc<Genome>) -> Self {
        Self {
            id: None,
            genome,
            individuals: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Generate `n` independent random founders with ids `"0"..n-1`.
    pub fn random_founders<R: Rng + ?Sized>(genome: Arc<Genome>, n: usize, rng: &mut R) -> Self {
        let individuals = (0..n)
            .map(|i| Individual::random(&genome, Some(i.to_string()), rng))
            .collect();
        Self {
            id: None,
            genome,
            individuals,
        }
    }

    /// Wrap a genotype batch `(n, ploidy, chr, loci)` into individuals with
    /// ids `"{prefix}{i}"`.
    pub fn from_genotypes(genome: Arc<Genome>, genotypes: ArrayView4<u8>, prefix: &str) -> Result<Self> {
        let shape = genome.shape();
        shape.check_genotypes(genotypes.shape(), "population genotypes")?;

        let individuals = genotypes
            .outer_iter()
            .enumerate()
            .map(|(i, haps)| Individual::new(&shape, haps.to_owned(), Some(format!("{}{}", prefix, i))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: None,
            genome,
            individuals,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn genome(&self) -> &Arc<Genome> {
        &self.genome
    }

    /// Number of individuals in the population.
    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    pub fn individual(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    /// Append an individual.
    ///
    /// # Errors
    ///
    /// `SimError::ShapeError` if its haplotypes do not match the genome.
    pub fn add_individual(&mut self, individual: Individual) -> Result<()> {
        self.genome
            .shape()
            .check_haplotypes(individual.haplotypes().shape(), "added individual")?;
        self.individuals.push(individual);
        Ok(())
    }

    /// A new population holding clones of the individuals at `indices`, in order.
    ///
    /// # Errors
    ///
    /// `SimError::InvalidConfiguration` if an index is out of range.
    pub fn subset(&self, indices: &[usize]) -> Result<Population> {
        let individuals = indices
            .iter()
            .map(|&i| {
                self.individuals.get(i).cloned().ok_or_else(|| {
                    SimError::InvalidConfiguration(format!(
                        "Index {} out of range for population of size {}",
                        i,
                        self.size()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: self.id.clone(),
            genome: Arc::clone(&self.genome),
            individuals,
        })
    }

    /// Stack all haplotypes into `(n_individuals, ploidy, chr, loci)`.
    pub fn get_genotypes(&self) -> Result<Genotypes> {
        self.ensure_not_empty("genotypes")?;
        let (ploidy, n_chr, n_loci) = self.genome.shape().dims();
        let mut genotypes = Array4::zeros((self.size(), ploidy, n_chr, n_loci));
        for (mut slot, ind) in genotypes.outer_iter_mut().zip(&self.individuals) {
            slot.assign(ind.haplotypes());
        }
        Ok(genotypes)
    }

    /// Allele dosages summed over the ploidy axis: `(n_individuals, chr, loci)`.
    pub fn get_dosages(&self) -> Result<Array3<u32>> {
        Ok(dosages(self.get_genotypes()?.view()))
    }

    /// Mean allele indicator over individuals and copies: `(chr, loci)`.
    pub fn calculate_allele_frequencies(&self) -> Result<Array2<f64>> {
        allele_frequencies(self.get_genotypes()?.view())
    }

    /// Expected heterozygosity `1 - (p^2 + (1-p)^2)` per locus.
    ///
    /// Assumes a two-allele model regardless of ploidy.
    pub fn calculate_genetic_diversity(&self) -> Result<Array2<f64>> {
        let freqs = self.calculate_allele_frequencies()?;
        Ok(freqs.mapv(|p| 1.0 - (p * p + (1.0 - p) * (1.0 - p))))
    }

    fn ensure_not_empty(&self, what: &str) -> Result<()> {
        if self.individuals.is_empty() {
            return Err(SimError::EmptyPopulation(format!(
                "cannot compute {} of a population with no individuals",
                what
            )));
        }
        Ok(())
    }
}

/// Sum a genotype batch over its ploidy axis.
pub fn dosages(genotypes: ArrayView4<u8>) -> Array3<u32> {
    genotypes.mapv(u32::from).sum_axis(Axis(1))
}

/// Per-locus allele frequency of a genotype batch: `sum(dosage) / (n * ploidy)`.
///
/// # Errors
///
/// `SimError::EmptyPopulation` if the batch has no individuals.
pub fn allele_frequencies(genotypes: ArrayView4<u8>) -> Result<Array2<f64>> {
    let (n, ploidy, _, _) = genotypes.dim();
    if n == 0 || ploidy == 0 {
        return Err(SimError::EmptyPopulation(
            "allele frequencies need at least one individual".into(),
        ));
    }
    let totals = dosages(genotypes).mapv(f64::from).sum_axis(Axis(0));
    Ok(totals / (n * ploidy) as f64)
}

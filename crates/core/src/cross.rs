//! Crossing schemes: random mating and doubled-haploid production.
//!
//! Both schemes consume a parent genotype batch `(n_parents, ploidy, chr,
//! loci)` and call the meiosis engine once per gamete. Progeny of a random
//! cross take `ploidy - ploidy / 2` gametes from the female and `ploidy / 2`
//! from the male, so a diploid gets one of each.

use std::sync::Arc;

use log::debug;
use ndarray::{Array4, ArrayView4, Axis};
use rand::Rng;

use crate::error::{Result, SimError};
use crate::genome::Genome;
use crate::meiosis::simulate_gametes;
use crate::population::{Individual, Population};
use crate::types::{Allele, Genotypes};

/// Indices of the two parents of one cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatingPair {
    pub female: usize,
    pub male: usize,
}

/// Draw `n_crosses` female and male indices uniformly from `[0, n_parents)`
/// with replacement. Selfing is allowed.
///
/// # Errors
///
/// `SimError::EmptyPopulation` if crosses are requested from zero parents.
pub fn sample_mating_pairs<R: Rng + ?Sized>(
    n_parents: usize,
    n_crosses: usize,
    rng: &mut R,
) -> Result<Vec<MatingPair>> {
    if n_parents == 0 && n_crosses > 0 {
        return Err(SimError::EmptyPopulation(format!(
            "cannot make {} crosses without parents",
            n_crosses
        )));
    }
    let females: Vec<usize> = (0..n_crosses).map(|_| rng.gen_range(0..n_parents)).collect();
    let males: Vec<usize> = (0..n_crosses).map(|_| rng.gen_range(0..n_parents)).collect();
    Ok(females
        .into_iter()
        .zip(males)
        .map(|(female, male)| MatingPair { female, male })
        .collect())
}

/// Produce one progeny per mating pair.
///
/// # Errors
///
/// * `SimError::ShapeError` if `parents` does not match the genome.
/// * `SimError::InvalidConfiguration` if a pair references a missing parent.
pub fn cross_pairs<R: Rng + ?Sized>(
    genome: &Genome,
    parents: ArrayView4<Allele>,
    pairs: &[MatingPair],
    rng: &mut R,
) -> Result<Genotypes> {
    genome.shape().check_genotypes(parents.shape(), "cross parents")?;
    let (n_parents, ploidy, n_chr, n_loci) = parents.dim();
    let mut progeny = Array4::zeros((pairs.len(), ploidy, n_chr, n_loci));
    if pairs.is_empty() {
        return Ok(progeny);
    }
    if let Some(bad) = pairs
        .iter()
        .find(|p| p.female >= n_parents || p.male >= n_parents)
    {
        return Err(SimError::InvalidConfiguration(format!(
            "mating pair {:?} references a parent outside 0..{}",
            bad, n_parents
        )));
    }

    let female_idx: Vec<usize> = pairs.iter().map(|p| p.female).collect();
    let male_idx: Vec<usize> = pairs.iter().map(|p| p.male).collect();
    let females = parents.select(Axis(0), &female_idx);
    let males = parents.select(Axis(0), &male_idx);

    let female_slots = ploidy - ploidy / 2;
    for slot in 0..ploidy {
        let source = if slot < female_slots { &females } else { &males };
        let gametes = simulate_gametes(genome, source.view(), rng)?;
        progeny.index_axis_mut(Axis(1), slot).assign(&gametes);
    }
    Ok(progeny)
}

/// Random crosses: `n_crosses` progeny from parents drawn with replacement.
///
/// Returns genotypes of shape `(n_crosses, ploidy, chr, loci)`.
pub fn random_cross<R: Rng + ?Sized>(
    genome: &Genome,
    parents: ArrayView4<Allele>,
    n_crosses: usize,
    rng: &mut R,
) -> Result<Genotypes> {
    genome.shape().check_genotypes(parents.shape(), "cross parents")?;
    let pairs = sample_mating_pairs(parents.len_of(Axis(0)), n_crosses, rng)?;
    cross_pairs(genome, parents, &pairs, rng)
}

/// Doubled haploids: one gamete per parent copied into every ploidy slot.
///
/// Output has the same shape and order as `parents`; every progeny is fully
/// homozygous.
pub fn doubled_haploid<R: Rng + ?Sized>(
    genome: &Genome,
    parents: ArrayView4<Allele>,
    rng: &mut R,
) -> Result<Genotypes> {
    let gametes = simulate_gametes(genome, parents, rng)?;
    let mut progeny = Array4::zeros(parents.raw_dim());
    for mut slot in progeny.axis_iter_mut(Axis(1)) {
        slot.assign(&gametes);
    }
    Ok(progeny)
}

/// Random crosses among the members of `parents`, returned as a population
/// whose individuals record their mother and father ids.
pub fn random_cross_population<R: Rng + ?Sized>(
    parents: &Population,
    n_crosses: usize,
    id_prefix: &str,
    rng: &mut R,
) -> Result<Population> {
    let genome = Arc::clone(parents.genome());
    let genotypes = parents.get_genotypes()?;
    let pairs = sample_mating_pairs(parents.size(), n_crosses, rng)?;
    let progeny = cross_pairs(&genome, genotypes.view(), &pairs, rng)?;
    debug!("Crossed {} progeny from {} parents", n_crosses, parents.size());

    let parent_id = |i: usize| parents.individual(i).and_then(|ind| ind.id()).map(str::to_string);
    assemble(genome, progeny, id_prefix, |i| {
        (parent_id(pairs[i].female), parent_id(pairs[i].male))
    })
}

/// Doubled haploids of every member of `parents`. Both parent ids of a
/// progeny name its single source parent.
pub fn doubled_haploid_population<R: Rng + ?Sized>(
    parents: &Population,
    id_prefix: &str,
    rng: &mut R,
) -> Result<Population> {
    let genome = Arc::clone(parents.genome());
    let genotypes = parents.get_genotypes()?;
    let progeny = doubled_haploid(&genome, genotypes.view(), rng)?;

    assemble(genome, progeny, id_prefix, |i| {
        let id = parents.individual(i).and_then(|ind| ind.id()).map(str::to_string);
        (id.clone(), id)
    })
}

fn assemble<F>(genome: Arc<Genome>, progeny: Genotypes, id_prefix: &str, lineage: F) -> Result<Population>
where
    F: Fn(usize) -> (Option<String>, Option<String>),
{
    let shape = genome.shape();
    let mut population = Population::new(genome);
    for (i, haps) in progeny.outer_iter().enumerate() {
        let (mother, father) = lineage(i);
        let child = Individual::new(&shape, haps.to_owned(), Some(format!("{}{}", id_prefix, i)))?
            .with_parents(mother, father);
        population.add_individual(child)?;
    }
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_parents(genome: &Genome, n: usize, rng: &mut StdRng) -> Genotypes {
        let (p, c, l) = genome.shape().dims();
        Array4::from_shape_simple_fn((n, p, c, l), || rng.gen_range(0..=1u8))
    }

    #[test]
    fn test_random_cross_shape() {
        let genome = Genome::uniform(2, 3, 4, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let parents = random_parents(&genome, 5, &mut rng);
        for n_crosses in [0, 1, 7, 40] {
            let progeny = random_cross(&genome, parents.view(), n_crosses, &mut rng).unwrap();
            assert_eq!(progeny.dim(), (n_crosses, 2, 3, 4));
        }
    }

    #[test]
    fn test_random_cross_shape_for_odd_and_high_ploidy() {
        let mut rng = StdRng::seed_from_u64(2);
        for ploidy in [1, 3, 4, 6] {
            let genome = Genome::uniform(ploidy, 2, 5, 100.0).unwrap();
            let parents = random_parents(&genome, 3, &mut rng);
            let progeny = random_cross(&genome, parents.view(), 4, &mut rng).unwrap();
            assert_eq!(progeny.dim(), (4, ploidy, 2, 5));
        }
    }

    #[test]
    fn test_cross_between_inbred_lines_is_heterozygous() {
        let genome = Genome::uniform(2, 2, 6, 100.0).unwrap();
        let mut parents = Array4::zeros((2, 2, 2, 6));
        parents.slice_mut(s![1, .., .., ..]).fill(1);
        let pairs = vec![MatingPair { female: 0, male: 1 }; 3];
        let mut rng = StdRng::seed_from_u64(3);
        let progeny = cross_pairs(&genome, parents.view(), &pairs, &mut rng).unwrap();

        assert!(progeny.slice(s![.., 0, .., ..]).iter().all(|&a| a == 0));
        assert!(progeny.slice(s![.., 1, .., ..]).iter().all(|&a| a == 1));
    }

    #[test]
    fn test_cross_rejects_rank_mismatch_and_empty_parents() {
        let genome = Genome::uniform(2, 3, 4, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let wrong = Array4::<u8>::zeros((3, 2, 4, 4));
        assert!(matches!(
            random_cross(&genome, wrong.view(), 2, &mut rng),
            Err(SimError::ShapeError { .. })
        ));

        let none = Array4::<u8>::zeros((0, 2, 3, 4));
        assert!(matches!(
            random_cross(&genome, none.view(), 2, &mut rng),
            Err(SimError::EmptyPopulation(_))
        ));
        assert_eq!(random_cross(&genome, none.view(), 0, &mut rng).unwrap().dim(), (0, 2, 3, 4));
    }

    #[test]
    fn test_sample_mating_pairs_in_range_with_replacement() {
        let mut rng = StdRng::seed_from_u64(6);
        let pairs = sample_mating_pairs(3, 500, &mut rng).unwrap();
        assert_eq!(pairs.len(), 500);
        assert!(pairs.iter().all(|p| p.female < 3 && p.male < 3));
        assert!(pairs.iter().any(|p| p.female == p.male), "selfing should occur");
    }

    #[test]
    fn test_doubled_haploids_are_homozygous() {
        let genome = Genome::uniform(2, 4, 10, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let parents = random_parents(&genome, 12, &mut rng);
        let dh = doubled_haploid(&genome, parents.view(), &mut rng).unwrap();

        assert_eq!(dh.dim(), parents.dim());
        for ind in dh.outer_iter() {
            assert_eq!(ind.index_axis(Axis(0), 0), ind.index_axis(Axis(0), 1));
        }
    }

    #[test]
    fn test_doubled_haploid_of_inbred_parent_is_the_parent() {
        let genome = Genome::uniform(3, 2, 5, 100.0).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let line = Array2::from_shape_simple_fn((2, 5), || rng.gen_range(0..=1u8));
        let mut parents = Array4::zeros((1, 3, 2, 5));
        for mut copy in parents.slice_mut(s![0, .., .., ..]).outer_iter_mut() {
            copy.assign(&line);
        }
        let dh = doubled_haploid(&genome, parents.view(), &mut rng).unwrap();
        assert_eq!(dh, parents);
    }

    #[test]
    fn test_population_crosses_record_lineage() {
        let genome = Arc::new(Genome::uniform(2, 2, 5, 100.0).unwrap());
        let mut rng = StdRng::seed_from_u64(9);
        let founders = Population::random_founders(Arc::clone(&genome), 4, &mut rng);

        let f1 = random_cross_population(&founders, 6, "F1_", &mut rng).unwrap();
        assert_eq!(f1.size(), 6);
        for (i, child) in f1.individuals().iter().enumerate() {
            assert_eq!(child.id(), Some(format!("F1_{}", i).as_str()));
            let mother: usize = child.mother_id().unwrap().parse().unwrap();
            let father: usize = child.father_id().unwrap().parse().unwrap();
            assert!(mother < 4 && father < 4);
        }

        let dh = doubled_haploid_population(&founders, "DH_", &mut rng).unwrap();
        assert_eq!(dh.size(), 4);
        assert_eq!(dh.individual(2).unwrap().mother_id(), Some("2"));
        assert_eq!(dh.individual(2).unwrap().father_id(), Some("2"));
    }
}

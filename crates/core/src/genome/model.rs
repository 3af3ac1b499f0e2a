use log::{debug, warn};
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::GeneticMap;

use super::shape::GenomeShape;

/// How locus positions are laid out along each chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MapType {
    /// Evenly spaced positions, identical on every chromosome.
    Uniform,
    /// Sorted uniform draws per chromosome, first locus fixed at 0 cM.
    #[default]
    Random,
    /// No map. Recombination falls back to a position-independent policy.
    Unmapped,
}

impl MapType {
    /// Parse a map type name. Unknown names yield [`MapType::Unmapped`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "uniform" => MapType::Uniform,
            "random" => MapType::Random,
            "none" | "unmapped" | "" => MapType::Unmapped,
            other => {
                warn!("Unknown map type '{}', genome will have no genetic map", other);
                MapType::Unmapped
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapType::Uniform => "uniform",
            MapType::Random => "random",
            MapType::Unmapped => "none",
        }
    }
}

impl From<String> for MapType {
    fn from(name: String) -> Self {
        MapType::from_name(&name)
    }
}

impl From<MapType> for String {
    fn from(map_type: MapType) -> Self {
        map_type.as_str().to_string()
    }
}

/// Genomic architecture shared by every individual of a simulation.
///
/// Holds the ploidy, chromosome and locus counts and the genetic map
/// (positions in centiMorgans, one row per chromosome). A genome is
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    shape: GenomeShape,
    map_type: MapType,
    chromosome_length: f64,
    genetic_map: Option<GeneticMap>,
}

impl Genome {
    /// Build a genome and its genetic map.
    ///
    /// `Random` maps draw `n_loci_per_chromosome - 1` positions uniformly in
    /// `[0, chromosome_length)` per chromosome, sort them and place them at
    /// loci `1..n`; locus 0 sits at 0 cM. `Uniform` maps place locus `i` at
    /// `i * chromosome_length / n_loci_per_chromosome`.
    ///
    /// # Errors
    ///
    /// `SimError::InvalidConfiguration` for zero ploidy, zero chromosome or
    /// locus counts, or a non-positive chromosome length.
    pub fn new<R: Rng + ?Sized>(
        ploidy: usize,
        n_chromosomes: usize,
        n_loci_per_chromosome: usize,
        map_type: MapType,
        chromosome_length: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let shape = validate(ploidy, n_chromosomes, n_loci_per_chromosome, chromosome_length)?;

        let genetic_map = match map_type {
            MapType::Uniform => Some(uniform_map(&shape, chromosome_length)),
            MapType::Random => Some(random_map(&shape, chromosome_length, rng)),
            MapType::Unmapped => None,
        };
        if genetic_map.is_some() {
            debug!(
                "Created {} genetic map: {} chromosomes x {} loci, {} cM",
                map_type.as_str(),
                n_chromosomes,
                n_loci_per_chromosome,
                chromosome_length
            );
        }

        Ok(Self {
            shape,
            map_type,
            chromosome_length,
            genetic_map,
        })
    }

    /// Build a genome with an evenly spaced map. Needs no random source.
    pub fn uniform(
        ploidy: usize,
        n_chromosomes: usize,
        n_loci_per_chromosome: usize,
        chromosome_length: f64,
    ) -> Result<Self> {
        let shape = validate(ploidy, n_chromosomes, n_loci_per_chromosome, chromosome_length)?;
        Ok(Self {
            genetic_map: Some(uniform_map(&shape, chromosome_length)),
            shape,
            map_type: MapType::Uniform,
            chromosome_length,
        })
    }

    /// Build a genome from an explicit genetic map.
    ///
    /// # Errors
    ///
    /// `SimError::InvalidConfiguration` if a map row decreases or a position
    /// falls outside `[0, chromosome_length]`.
    pub fn with_map(ploidy: usize, genetic_map: GeneticMap, chromosome_length: f64) -> Result<Self> {
        let (n_chromosomes, n_loci) = genetic_map.dim();
        let shape = validate(ploidy, n_chromosomes, n_loci, chromosome_length)?;

        for (chr, row) in genetic_map.outer_iter().enumerate() {
            if let Some(&pos) = row
                .iter()
                .find(|&&pos| !(0.0..=chromosome_length).contains(&pos))
            {
                return Err(SimError::InvalidConfiguration(format!(
                    "Map position {} on chromosome {} is outside [0, {}]",
                    pos, chr, chromosome_length
                )));
            }
            if row.windows(2).into_iter().any(|w| w[1] < w[0]) {
                return Err(SimError::InvalidConfiguration(format!(
                    "Map positions on chromosome {} must be non-decreasing",
                    chr
                )));
            }
        }

        Ok(Self {
            shape,
            map_type: MapType::Random,
            chromosome_length,
            genetic_map: Some(genetic_map),
        })
    }

    /// The (ploidy, n_chromosomes, n_loci_per_chromosome) descriptor.
    pub fn shape(&self) -> GenomeShape {
        self.shape
    }

    pub fn ploidy(&self) -> usize {
        self.shape.ploidy
    }

    pub fn n_chromosomes(&self) -> usize {
        self.shape.n_chromosomes
    }

    pub fn n_loci_per_chromosome(&self) -> usize {
        self.shape.n_loci_per_chromosome
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    /// Genetic length of each chromosome in centiMorgans.
    pub fn chromosome_length(&self) -> f64 {
        self.chromosome_length
    }

    /// Locus positions in cM, or `None` for an unmapped genome.
    pub fn genetic_map(&self) -> Option<&GeneticMap> {
        self.genetic_map.as_ref()
    }
}

fn validate(
    ploidy: usize,
    n_chromosomes: usize,
    n_loci_per_chromosome: usize,
    chromosome_length: f64,
) -> Result<GenomeShape> {
    if ploidy == 0 {
        return Err(SimError::InvalidConfiguration(
            "Ploidy must be greater than 0".into(),
        ));
    }
    if n_chromosomes == 0 {
        return Err(SimError::InvalidConfiguration(
            "Number of chromosomes must be greater than 0".into(),
        ));
    }
    if n_loci_per_chromosome == 0 {
        return Err(SimError::InvalidConfiguration(
            "Loci per chromosome must be greater than 0".into(),
        ));
    }
    if !(chromosome_length.is_finite() && chromosome_length > 0.0) {
        return Err(SimError::InvalidConfiguration(format!(
            "Chromosome length must be a positive number of cM, got {}",
            chromosome_length
        )));
    }
    Ok(GenomeShape::new(ploidy, n_chromosomes, n_loci_per_chromosome))
}

fn uniform_map(shape: &GenomeShape, chromosome_length: f64) -> GeneticMap {
    let step = chromosome_length / shape.n_loci_per_chromosome as f64;
    Array2::from_shape_fn(
        (shape.n_chromosomes, shape.n_loci_per_chromosome),
        |(_, locus)| locus as f64 * step,
    )
}

fn random_map<R: Rng + ?Sized>(shape: &GenomeShape, chromosome_length: f64, rng: &mut R) -> GeneticMap {
    let mut map = Array2::zeros((shape.n_chromosomes, shape.n_loci_per_chromosome));
    for mut row in map.outer_iter_mut() {
        let mut positions: Vec<f64> = (1..shape.n_loci_per_chromosome)
            .map(|_| rng.gen_range(0.0..chromosome_length))
            .collect();
        positions.sort_by(f64::total_cmp);
        for (locus, pos) in positions.into_iter().enumerate() {
            row[locus + 1] = pos;
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_valid_map(genome: &Genome) {
        let map = genome.genetic_map().unwrap();
        assert_eq!(map.dim(), (genome.n_chromosomes(), genome.n_loci_per_chromosome()));
        for row in map.outer_iter() {
            assert_eq!(row[0], 0.0, "first locus must sit at 0 cM");
            for w in row.windows(2) {
                assert!(w[1] >= w[0], "map row must be non-decreasing: {:?}", row);
            }
            for &pos in row.iter() {
                assert!(pos >= 0.0 && pos <= genome.chromosome_length());
            }
        }
    }

    #[test]
    fn test_uniform_map_positions() {
        let genome = Genome::uniform(2, 3, 4, 100.0).unwrap();
        let map = genome.genetic_map().unwrap();
        for row in map.outer_iter() {
            assert_relative_eq!(row[0], 0.0);
            assert_relative_eq!(row[1], 25.0);
            assert_relative_eq!(row[2], 50.0);
            assert_relative_eq!(row[3], 75.0);
        }
        assert_valid_map(&genome);
    }

    #[test]
    fn test_random_map_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for &(n_chr, n_loci) in &[(1, 1), (3, 2), (10, 5), (4, 200)] {
            let genome = Genome::new(2, n_chr, n_loci, MapType::Random, 150.0, &mut rng).unwrap();
            assert_valid_map(&genome);
        }
    }

    #[test]
    fn test_random_map_is_reproducible_from_seed() {
        let a = Genome::new(2, 4, 10, MapType::Random, 100.0, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = Genome::new(2, 4, 10, MapType::Random, 100.0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unmapped_genome_has_no_map() {
        let mut rng = StdRng::seed_from_u64(1);
        let genome = Genome::new(2, 2, 3, MapType::from_name("physical"), 100.0, &mut rng).unwrap();
        assert_eq!(genome.map_type(), MapType::Unmapped);
        assert!(genome.genetic_map().is_none());
        assert_eq!(genome.shape().dims(), (2, 2, 3));
    }

    #[test]
    fn test_zero_counts_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        for (p, c, l) in [(2, 0, 5), (2, 5, 0), (0, 5, 5)] {
            let err = Genome::new(p, c, l, MapType::Uniform, 100.0, &mut rng).unwrap_err();
            assert!(matches!(err, SimError::InvalidConfiguration(_)));
        }
        assert!(Genome::uniform(2, 1, 1, 0.0).is_err());
    }

    #[test]
    fn test_with_map_validation() {
        let ok = Array2::from_shape_vec((1, 3), vec![0.0, 10.0, 10.0]).unwrap();
        assert!(Genome::with_map(2, ok, 50.0).is_ok());

        let decreasing = Array2::from_shape_vec((1, 3), vec![0.0, 20.0, 10.0]).unwrap();
        assert!(Genome::with_map(2, decreasing, 50.0).is_err());

        let outside = Array2::from_shape_vec((1, 2), vec![0.0, 60.0]).unwrap();
        assert!(Genome::with_map(2, outside, 50.0).is_err());
    }

    #[test]
    fn test_map_type_serde_falls_back_to_unmapped() {
        let parsed: MapType = serde_json::from_str("\"Uniform\"").unwrap();
        assert_eq!(parsed, MapType::Uniform);
        let parsed: MapType = serde_json::from_str("\"haldane-physical\"").unwrap();
        assert_eq!(parsed, MapType::Unmapped);
        assert_eq!(serde_json::to_string(&MapType::Random).unwrap(), "\"random\"");
    }
}

use ndarray::{Array2, Array3, Array4};

/// Allele indicator stored at every (copy, chromosome, locus) cell.
pub type Allele = u8;

/// The scalar type used for maps, effects and genetic values.
pub type Scalar = f64;

/// Genetic map positions in centiMorgans: (n_chromosomes, n_loci_per_chromosome).
pub type GeneticMap = Array2<Scalar>;

/// Haplotypes of one individual: (ploidy, n_chromosomes, n_loci_per_chromosome).
pub type Haplotypes = Array3<Allele>;

/// A batch of gametes: (n, n_chromosomes, n_loci_per_chromosome).
pub type Gametes = Array3<Allele>;

/// A batch of genotypes: (n, ploidy, n_chromosomes, n_loci_per_chromosome).
pub type Genotypes = Array4<Allele>;

/// Boolean QTL marks: (n_chromosomes, n_loci_per_chromosome).
pub type QtlMap = Array2<bool>;

/// Per-locus additive effects: (n_chromosomes, n_loci_per_chromosome).
pub type Effects = Array2<Scalar>;

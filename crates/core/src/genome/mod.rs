// Genome architecture: ploidy, chromosomes, loci and the genetic map.

pub mod model;
pub mod shape;

pub use model::{Genome, MapType};
pub use shape::{as_genotype_batch, GenomeShape};

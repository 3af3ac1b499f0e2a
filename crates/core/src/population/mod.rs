// Individuals, populations and population-level genomic summaries.

pub mod individual;
pub mod population;

pub use individual::Individual;
pub use population::{allele_frequencies, dosages, Population};

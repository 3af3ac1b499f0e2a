//! Forward-in-time simulation of plant breeding programs.
//!
//! Genomes are arrays of biallelic loci of shape `(ploidy, chromosomes,
//! loci)`. Gametes are drawn by meiosis under Haldane recombination, crosses
//! combine gametes from two parents, and an additive trait model turns
//! genotypes into calibrated genetic values.

pub mod config;
pub mod cross;
pub mod error;
pub mod genome;
pub mod meiosis;
pub mod population;
pub mod program;
pub mod selection;
pub mod trait_model;
pub mod types;

pub use error::{Result, SimError};

// Meiosis: recombination probabilities from the genetic map and gamete formation.

pub mod gamete;
pub mod recombination;

pub use gamete::simulate_gametes;
pub use recombination::{crossover_probabilities, haldane, UNMAPPED_SWITCH_PROBABILITY};

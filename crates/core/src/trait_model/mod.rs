// Additive quantitative traits: QTL design, calibration against founders,
// genetic values.

pub mod additive;
pub mod design;
pub mod variance;

pub use additive::{scaled_dosages, AdditiveTrait, InterceptPolicy};
pub use design::{generate_effects, select_qtl, TraitSpec};
pub use variance::{expected_genetic_variance, sample_variance};

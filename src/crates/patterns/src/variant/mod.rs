//! Pattern variants for A/B and canary rollout

mod ab_testing;
mod selector;

pub use ab_testing::{AbTestingLibrary, VariantSelection, DEFAULT_VARIANT};
pub use selector::{
    new_canary_selector, ExplicitSelector, HashSelector, RandomSelector, VariantSelector,
    WeightedSelector,
};

//! Builds the instruction sent to the image model for one variation.

use std::collections::BTreeSet;

use rand::Rng;

use crate::trait_pool::TraitCategory;

/// Composes a prompt from the cached style, the active trait categories and
/// the optional free text.
///
/// Every call samples afresh, so two calls with the same inputs usually give
/// different prompts.
pub fn compose<R: Rng + ?Sized>(
    style: &str,
    active: &BTreeSet<TraitCategory>,
    extra: Option<&str>,
    rng: &mut R,
) -> String {
    let parts = active
        .iter()
        .map(|category| category.sample(rng))
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>();

    let extra = extra
        .map(str::trim)
        .filter(|extra| !extra.is_empty())
        .map(|extra| format!(" Additional style: {extra}."))
        .unwrap_or_default();

    format!(
        "Generate a cartoon NFT monkey character. Art style: {style}. \n\
         Traits to apply: {traits}.{extra}\n\
         Keep the same species (monkey/chimp), same cute cartoon aesthetic, same art style. \
         Square format, centered character.",
        traits = parts.join("; "),
    )
}

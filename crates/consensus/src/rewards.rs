//! Subsidy schedule helpers.

use crate::money::Amount;
use crate::params::ChainParams;

/// Work subsidy paid by the coinbase at `height`, halving every
/// `subsidy_halving_interval` blocks.
pub fn block_subsidy(height: u32, params: &ChainParams) -> Amount {
    if params.subsidy_halving_interval == 0 {
        return params.base_subsidy;
    }
    let halvings = height / params.subsidy_halving_interval;
    if halvings >= 64 {
        return 0;
    }
    params.base_subsidy >> halvings
}

/// Portion of the subsidy paid to the tax output.
pub fn block_tax(height: u32, params: &ChainParams) -> Amount {
    let subsidy = block_subsidy(height, params);
    subsidy * Amount::from(params.block_tax_proportion) / 100
}

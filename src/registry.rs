//! Static mainnet address tables for the Bancor contracts the gateway reads.

/// Bancor liquidity protection contract, target of `poolAvailableSpace`.
pub const LIQUIDITY_PROTECTION: &str = "0x42743F4d9f139bfD04680Df50Bce2d7Dd8816F90";

/// Bancor vortex burner contract, target of `totalBurnedAmount`.
pub const VORTEX_BURNER: &str = "0x2f87b1fca1769BC3361700078e1985b2Dc0f1142";

/// Pool anchor per supported token symbol. The anchor is passed to the
/// liquidity protection contract and, for vbnt, owns the vortex converter.
const POOL_ANCHORS: &[(&str, &str)] = &[
    ("eth", "0xb1CD6e4153B2a390Cf00A6556b0fC1458C4A5533"),
    ("link", "0x04D0231162b4784b706908c787CE32bD075db9b7"),
    ("wbtc", "0xFEE7EeaA0c2f3F7C7e6301751a8dE55cE4D059Ec"),
    ("dai", "0xE5Df055773Bf9710053923599504831c7DBdD697"),
    ("vbnt", "0xd5B953ecd1C58bc0951b5617477a2BE6f35e44f6"),
];

/// ERC-20 token contract per symbol, for `totalSupply` reads.
const TOKEN_ADDRESSES: &[(&str, &str)] = &[
    ("vbnt", "0x48Fb253446873234F2fEBbF9BdeAA72d9d387f94"),
    ("bnt", "0x1F573D6Fb3F13d689FF844B4cE37794d79a7FF1C"),
];

pub fn pool_anchor(token: &str) -> Option<&'static str> {
    POOL_ANCHORS
        .iter()
        .find(|(symbol, _)| *symbol == token)
        .map(|(_, address)| *address)
}

pub fn token_address(token: &str) -> Option<&'static str> {
    TOKEN_ADDRESSES
        .iter()
        .find(|(symbol, _)| *symbol == token)
        .map(|(_, address)| *address)
}

/// Whether any contract table knows this symbol. Exact, case-sensitive match.
pub fn is_known_token(token: &str) -> bool {
    pool_anchor(token).is_some() || token_address(token).is_some()
}

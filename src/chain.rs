//! On-chain data source adapter: read-only contract calls over JSON-RPC.

use crate::error::GatewayError;
use crate::registry;
use crate::store::Store;
use alloy_primitives::utils::format_ether;
use alloy_primitives::{Address, U256, hex, keccak256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REQ_TIMEOUT: Duration = Duration::from_secs(5);

// The converter behind the vortex pool rarely changes; its discovery call is
// short-cached in the shared store instead of hitting the node every time.
const CONVERTER_CACHE_KEY: &str = "vortexConverter";
const CONVERTER_CACHE_SECS: u64 = 60;

/// Eth node JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,

    /// Name of the RPC method to call (e.g., "eth_call").
    pub method: String,

    #[serde(default)]
    pub params: serde_json::Value,

    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,

    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The contract reads the gateway exposes. Behind a trait so route tests can
/// stub the chain out and count invocations.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Remaining protected-liquidity headroom for a token's pool, 2 dp.
    async fn pool_available_space(&self, token: &str) -> Result<String, GatewayError>;

    /// vbnt/bnt exchange rate from the vortex converter reserves, 6 dp.
    async fn vortex_rate(&self, token: &str) -> Result<String, GatewayError>;

    /// Total vbnt burned by the vortex burner, 2 dp.
    async fn vortex_burned(&self) -> Result<String, GatewayError>;

    /// ERC-20 total supply for a token, 2 dp.
    async fn total_supply(&self, token: &str) -> Result<String, GatewayError>;
}

pub struct RpcChainSource {
    client: reqwest::Client,
    endpoint: String,
    store: Arc<dyn Store>,
}

impl RpcChainSource {
    pub fn new(endpoint: String, store: Arc<dyn Store>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQ_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Upstream(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            store,
        })
    }

    async fn eth_call(&self, to: &str, data: String) -> Result<Vec<u8>, GatewayError> {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "eth_call".to_string(),
            params: serde_json::json!([{ "to": to, "data": data }, "latest"]),
            id: serde_json::Value::from(1),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to parse response: {e}")))?;

        if let Some(error) = rpc_response.error {
            return Err(GatewayError::Upstream(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        let result = rpc_response
            .result
            .and_then(|value| value.as_str().map(str::to_owned))
            .ok_or_else(|| GatewayError::Upstream("empty eth_call result".to_string()))?;

        hex::decode(&result)
            .map_err(|e| GatewayError::Upstream(format!("bad hex in result: {e}")))
    }

    /// Converter address = owner of the vbnt pool anchor, via the store.
    async fn vortex_converter(&self) -> Result<String, GatewayError> {
        match self.store.get(CONVERTER_CACHE_KEY).await {
            Ok(Some(address)) => return Ok(address),
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "converter cache read failed"),
        }

        let pool = registry::pool_anchor("vbnt").ok_or(GatewayError::UnsupportedToken)?;
        let words = self.eth_call(pool, encode_call("owner()", None)?).await?;
        let address = decode_address(&words)?;

        if let Err(error) = self
            .store
            .set_with_ttl(CONVERTER_CACHE_KEY, &address, CONVERTER_CACHE_SECS)
            .await
        {
            tracing::warn!(%error, "converter cache write failed");
        }
        Ok(address)
    }
}

#[async_trait]
impl ChainSource for RpcChainSource {
    async fn pool_available_space(&self, token: &str) -> Result<String, GatewayError> {
        let pool = registry::pool_anchor(token).ok_or(GatewayError::UnsupportedToken)?;
        let data = encode_call("poolAvailableSpace(address)", Some(pool))?;
        let words = self.eth_call(registry::LIQUIDITY_PROTECTION, data).await?;

        // First return word is the base-token space.
        let space = decode_u256(&words, 0)?;
        Ok(round_to(wei_to_f64(space), 2))
    }

    async fn vortex_rate(&self, token: &str) -> Result<String, GatewayError> {
        if token != "vbnt" && token != "bnt" {
            return Err(GatewayError::UnsupportedToken);
        }

        let converter = self.vortex_converter().await?;
        let words = self
            .eth_call(&converter, encode_call("reserveBalances()", None)?)
            .await?;

        let bnt = wei_to_f64(decode_u256(&words, 0)?);
        let vbnt = wei_to_f64(decode_u256(&words, 1)?);
        let rate = if token == "vbnt" { bnt / vbnt } else { vbnt / bnt };

        if !rate.is_finite() {
            return Err(GatewayError::Upstream("empty reserve balance".to_string()));
        }
        Ok(round_to(rate, 6))
    }

    async fn vortex_burned(&self) -> Result<String, GatewayError> {
        let words = self
            .eth_call(
                registry::VORTEX_BURNER,
                encode_call("totalBurnedAmount()", None)?,
            )
            .await?;

        let burned = decode_u256(&words, 0)?;
        Ok(round_to(wei_to_f64(burned), 2))
    }

    async fn total_supply(&self, token: &str) -> Result<String, GatewayError> {
        let address = registry::token_address(token).ok_or(GatewayError::UnsupportedToken)?;
        let words = self
            .eth_call(address, encode_call("totalSupply()", None)?)
            .await?;

        let supply = decode_u256(&words, 0)?;
        Ok(round_to(wei_to_f64(supply), 2))
    }
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// ABI-encode a call with at most one address argument, as 0x-prefixed hex.
fn encode_call(signature: &str, address_arg: Option<&str>) -> Result<String, GatewayError> {
    let mut data = selector(signature).to_vec();

    if let Some(raw) = address_arg {
        let address: Address = raw
            .parse()
            .map_err(|e| GatewayError::Upstream(format!("bad address {raw}: {e}")))?;
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        data.extend_from_slice(&word);
    }

    Ok(format!("0x{}", hex::encode(data)))
}

fn decode_u256(words: &[u8], index: usize) -> Result<U256, GatewayError> {
    let start = index * 32;
    let end = start + 32;
    if words.len() < end {
        return Err(GatewayError::Upstream(format!(
            "short eth_call return data: {} bytes",
            words.len()
        )));
    }
    Ok(U256::from_be_slice(&words[start..end]))
}

fn decode_address(words: &[u8]) -> Result<String, GatewayError> {
    if words.len() < 32 {
        return Err(GatewayError::Upstream(format!(
            "short eth_call return data: {} bytes",
            words.len()
        )));
    }
    Ok(Address::from_slice(&words[12..32]).to_string())
}

fn wei_to_f64(value: U256) -> f64 {
    format_ether(value).parse().unwrap_or(f64::NAN)
}

/// Fixed-point rounding with trailing zeros trimmed, matching the upstream
/// API's number formatting ("123.46", "100", "0.5").
pub(crate) fn round_to(value: f64, places: usize) -> String {
    let fixed = format!("{value:.places$}");
    if fixed.contains('.') {
        fixed
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_hash() {
        // keccak("totalSupply()")[0..4]
        assert_eq!(selector("totalSupply()"), [0x18, 0x16, 0x0d, 0xdd]);
    }

    #[test]
    fn encode_call_pads_address_to_a_word() {
        let data = encode_call(
            "poolAvailableSpace(address)",
            Some("0xb1CD6e4153B2a390Cf00A6556b0fC1458C4A5533"),
        )
        .unwrap();

        assert!(data.starts_with("0x"));
        // 4 selector bytes + 32 argument bytes, hex-encoded.
        assert_eq!(data.len(), 2 + (4 + 32) * 2);
        assert!(data[2 + 8..].starts_with("000000000000000000000000b1cd6e41"));
    }

    #[test]
    fn encode_call_without_args_is_just_the_selector() {
        let data = encode_call("owner()", None).unwrap();
        assert_eq!(data.len(), 2 + 8);
    }

    #[test]
    fn decode_u256_picks_the_indexed_word() {
        let mut words = vec![0u8; 64];
        words[31] = 1;
        words[63] = 2;

        assert_eq!(decode_u256(&words, 0).unwrap(), U256::from(1));
        assert_eq!(decode_u256(&words, 1).unwrap(), U256::from(2));
        assert!(decode_u256(&words, 2).is_err());
    }

    #[test]
    fn decode_address_takes_the_low_twenty_bytes() {
        let mut words = vec![0u8; 32];
        words[12..].copy_from_slice(&[0x11; 20]);

        let address = decode_address(&words).unwrap();
        assert!(address.to_lowercase().ends_with(&"11".repeat(20)));
        assert!(decode_address(&[0u8; 16]).is_err());
    }

    #[test]
    fn wei_conversion_divides_by_ten_to_the_eighteenth() {
        let one_ether = U256::from(10).pow(U256::from(18));
        assert_eq!(round_to(wei_to_f64(one_ether), 2), "1");

        let one_and_a_half = one_ether + one_ether / U256::from(2);
        assert_eq!(round_to(wei_to_f64(one_and_a_half), 2), "1.5");
    }

    #[test]
    fn rounding_trims_trailing_zeros() {
        assert_eq!(round_to(123.456789, 2), "123.46");
        assert_eq!(round_to(123.456789, 6), "123.456789");
        assert_eq!(round_to(100.0, 2), "100");
        assert_eq!(round_to(0.5, 6), "0.5");
        assert_eq!(round_to(0.987654321, 6), "0.987654");
    }
}

use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_RANKING_URL: &str = "https://defipulse.com/";

/// Process configuration. The upstream RPC endpoint and the store connection
/// are the only required environment surface; everything else has local
/// defaults. Without `REDIS_URL` the gateway runs on its in-process store.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub rpc_url: String,
    pub redis_url: Option<String>,
    pub ranking_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("GATEWAY_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into()),
            rpc_url: env::var("ETH_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.into()),
            redis_url: env::var("REDIS_URL").ok(),
            ranking_url: env::var("RANKING_URL").unwrap_or_else(|_| DEFAULT_RANKING_URL.into()),
        }
    }
}

//! # Pulse Modules
//!
//! Concrete aggregation modules for the pulse reactive runtime.
//!
//! - [`eth_usd`]: one ETH/USD price per adapter source, fed by the polling driver
//! - [`ccc`]: the average of those prices across sources

use pulse_runtime::Runtime;
use pulse_runtime::config::ModulesConfig;

pub mod ccc;
pub mod eth_usd;

/// Register every configured source plus the cross-source average.
pub fn install_all(runtime: &Runtime, config: &ModulesConfig) {
    for source in &config.sources {
        eth_usd::install(runtime, &config.adapter_base_url, source);
    }
    ccc::install(runtime, &config.sources);
}

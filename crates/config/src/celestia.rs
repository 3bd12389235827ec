use clap::Parser;
use url::Url;

/// Celestia-related configuration options, used when the DA mode is `celestia`
#[derive(Debug, Clone, Parser)]
pub struct CelestiaOpts {
    /// The URL of the Celestia node JSON-RPC endpoint
    #[clap(long = "celestia.endpoint", env = "SURGE_CELESTIA_ENDPOINT")]
    pub endpoint: Option<Url>,
    /// The auth token of the Celestia node
    #[clap(long = "celestia.auth-token", env = "SURGE_CELESTIA_AUTH_TOKEN")]
    pub auth_token: Option<String>,
    /// The hex-encoded namespace blobs are submitted to
    #[clap(long = "celestia.namespace", env = "SURGE_CELESTIA_NAMESPACE")]
    pub namespace: Option<String>,
    /// The timeout of every Celestia request, in seconds
    #[clap(long = "celestia.timeout", env = "SURGE_CELESTIA_TIMEOUT", default_value_t = 60)]
    pub timeout_secs: u64,
}

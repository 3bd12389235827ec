#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Configuration for the Surge rollup node.

use clap::{
    Parser, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Color, Style},
    },
};

mod celestia;
pub use celestia::CelestiaOpts;

mod chain;
pub use chain::{ContractAddresses, L1Opts, L2Opts};

mod operator;
pub use operator::OperatorOpts;

mod proposer;
pub use proposer::{CostMethod, DaMode, ProposerOpts};

mod prover;
pub use prover::ProverOpts;

mod telemetry;
pub use telemetry::{LogProvider, TelemetryOpts};

/// Which components the node runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum NodeMode {
    /// Only the proof pipeline.
    Prover,
    /// Only the batch proposer.
    Proposer,
    /// Both the proposer and the prover.
    #[default]
    Full,
}

impl NodeMode {
    /// Returns true if the prover runs in this mode.
    pub const fn runs_prover(&self) -> bool {
        matches!(self, Self::Prover | Self::Full)
    }

    /// Returns true if the proposer runs in this mode.
    pub const fn runs_proposer(&self) -> bool {
        matches!(self, Self::Proposer | Self::Full)
    }
}

/// CLI options for the Surge node.
#[derive(Debug, Clone, Parser)]
#[command(author, version, styles = cli_styles(), about)]
pub struct Opts {
    /// A unique name for this instance, used in metrics and logs
    #[clap(long, env = "SURGE_INSTANCE_NAME", default_value = "surge")]
    pub instance_name: String,
    /// Which components to run
    #[clap(long, env = "SURGE_MODE", value_enum, default_value_t = NodeMode::Full)]
    pub mode: NodeMode,
    /// L1-related configuration options
    #[clap(flatten)]
    pub l1: L1Opts,
    /// L2-related configuration options
    #[clap(flatten)]
    pub l2: L2Opts,
    /// Operator-related configuration options
    #[clap(flatten)]
    pub operator: OperatorOpts,
    /// The contract addresses required to run the node.
    #[clap(flatten)]
    pub contracts: ContractAddresses,
    /// Prover-related configuration options
    #[clap(flatten)]
    pub prover: ProverOpts,
    /// Proposer-related configuration options
    #[clap(flatten)]
    pub proposer: ProposerOpts,
    /// Celestia-related configuration options
    #[clap(flatten)]
    pub celestia: CelestiaOpts,
    /// Telemetry-related configuration options
    #[clap(flatten)]
    pub telemetry: TelemetryOpts,
}

/// Styles for the CLI.
const fn cli_styles() -> Styles {
    Styles::styled()
        .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use surge_primitives::tier::ProofTier;

    use super::{CostMethod, DaMode, NodeMode, Opts};

    const REQUIRED: &[&str] = &[
        "surge",
        "--l1.el-url",
        "http://localhost:8545",
        "--l2.el-url",
        "http://localhost:28545",
        "--l2.engine-url",
        "http://localhost:28551",
        "--l2.jwt-secret",
        "0x2aa5ef6bbd2c7c3be33fb5e0fde8c0c3f07c3e8a4ed1c2a5c7a8f8b6d3e1f0a9",
        "--operator.private-key",
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "--contracts.taiko-inbox",
        "0x0000000000000000000000000000000000000001",
        "--contracts.taiko-token",
        "0x0000000000000000000000000000000000000002",
        "--contracts.taiko-anchor",
        "0x0000000000000000000000000000000000000003",
    ];

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn test_defaults() {
        let mut args = REQUIRED.to_vec();
        args.push("--prover.dummy");
        let opts = Opts::try_parse_from(args).unwrap();

        assert_eq!(opts.mode, NodeMode::Full);
        assert_eq!(opts.prover.tiers, vec![ProofTier::Optimistic, ProofTier::Tee]);
        assert_eq!(opts.prover.confirmations, 6);
        assert_eq!(opts.proposer.da, DaMode::Blob);
        assert_eq!(opts.proposer.cost_method, CostMethod::FeeHistory);
        assert_eq!(opts.proposer.base_fee_share_pct, None);
        assert!(opts.proposer.propose_interval_secs.is_none());
    }

    #[test]
    fn test_raiko_required_without_dummy() {
        assert!(Opts::try_parse_from(REQUIRED).is_err());

        let mut args = REQUIRED.to_vec();
        args.extend(["--raiko.endpoint", "http://localhost:8080", "--mode", "prover"]);
        let opts = Opts::try_parse_from(args).unwrap();
        assert!(opts.mode.runs_prover());
        assert!(!opts.mode.runs_proposer());
    }
}

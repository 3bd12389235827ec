/// `ITaikoAnchor.sol` L2 contract bindings
///
/// Ref: <https://github.com/taikoxyz/taiko-mono/blob/main/packages/protocol/contracts/layer2/based/TaikoAnchor.sol>
pub mod anchor;

/// `SignalService.sol` and `Bridge.sol` L1 contract bindings
///
/// Ref: <https://github.com/taikoxyz/taiko-mono/blob/main/packages/protocol/contracts/shared/bridge/Bridge.sol>
pub mod bridge;

/// `TaikoWrapper.sol` and `ForcedInclusionStore.sol` L1 contract bindings
///
/// Ref: <https://github.com/taikoxyz/taiko-mono/blob/main/packages/protocol/contracts/layer1/forced-inclusion/TaikoWrapper.sol>
pub mod forced_inclusion;

/// `ITaikoInbox.sol` L1 contract bindings
///
/// Ref: <https://github.com/taikoxyz/taiko-mono/blob/main/packages/protocol/contracts/layer1/based/ITaikoInbox.sol>
pub mod inbox;

/// `TaikoToken.sol` contract bindings
///
/// Ref: <https://github.com/taikoxyz/taiko-mono/blob/main/packages/protocol/contracts/layer1/token/TaikoToken.sol>
pub mod token;

use alloy::{rpc::types::Filter, sol};
use alloy_primitives::Address;
use alloy_sol_types::{SolCall, SolEvent};

/// Returns a log [`Filter`] matching the `SignalSent` events of the signal service.
pub fn signal_sent_filter(signal_service: Address) -> Filter {
    Filter::new().address(signal_service).event_signature(ISignalService::SignalSent::SIGNATURE_HASH)
}

/// Returns true if a transaction to `to` with the given input calls `sendMessage` on the
/// `bridge` contract.
pub fn is_send_message(to: Option<Address>, input: &[u8], bridge: Address) -> bool {
    to == Some(bridge) && input.starts_with(&IBridge::sendMessageCall::SELECTOR)
}

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ISignalService {
        event SignalSent(address app, bytes32 signal, bytes32 slot, bytes32 value);
    }
}

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IBridge {
        #[derive(Default)]
        struct Message {
            uint64 id;
            uint64 fee;
            uint32 gasLimit;
            address from;
            uint64 srcChainId;
            address srcOwner;
            uint64 destChainId;
            address destOwner;
            address to;
            uint256 value;
            bytes data;
        }

        function sendMessage(Message calldata _message)
            external
            payable
            returns (bytes32 msgHash_, Message memory message_);
    }
}

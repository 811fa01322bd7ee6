//! Solidity bindings for the smart-contract wallet.

use alloy::sol;

sol! {
    /// A single call as hashed by the wallet's EIP-712 domain.
    #[derive(Debug, PartialEq, Eq)]
    struct Call {
        address to;
        uint256 value;
        bytes data;
        uint256 gasLimit;
        bool delegateCall;
        bool onlyFallback;
        uint256 behaviorOnError;
    }

    /// A batch of calls under one nonce.
    #[derive(Debug, PartialEq, Eq)]
    struct Calls {
        Call[] calls;
        uint256 space;
        uint256 nonce;
        address[] wallets;
    }

    /// Entry points used by the relay pipeline.
    interface IWallet {
        function execute(bytes _payload, bytes _signature) external payable;
        function readNonce(uint256 _space) external view returns (uint256);
    }
}

/// EIP-712 domain name of the wallet contract.
pub const DOMAIN_NAME: &str = "Sequence Wallet";

/// EIP-712 domain version of the wallet contract.
pub const DOMAIN_VERSION: &str = "3";

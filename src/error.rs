use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Amount exceeds balance (amount={amount}, balance={balance})")]
    InsufficientBalance { amount: u64, balance: u64 },
}

/// Reasons a candidate chain is refused by `replace_chain`. Local state is untouched in every case.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("The incoming chain must be longer (incoming={incoming}, current={current})")]
    NotLonger { incoming: usize, current: usize },

    #[error("The incoming chain must be valid")]
    InvalidChain,

    #[error("The incoming chain has invalid transaction data")]
    InvalidTransactionData,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MineError {
    #[error("mining was cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error(transparent)]
    Mine(#[from] MineError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("chain tip moved while mining (expected lastHash={expected})")]
    StaleTip { expected: String },
}

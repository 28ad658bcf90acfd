use thiserror::Error;

/// Error classification used by callers that need to tell an invalid spend
/// apart from a broken script or engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or oversized script, unbalanced conditionals, disabled opcodes.
    Structural,
    /// An opcode needed more stack items than were available.
    StackUnderflow,
    /// A hashing or signature delegate rejected its input.
    CryptoDelegate,
    /// The script ran to completion but did not authorize the spend.
    NegativeVerdict,
    /// A template builder was given unusable input.
    Construction,
    /// Anything else: bad arguments, I/O, decoding.
    Other,
}

#[derive(Error, Debug)]
pub enum DogeError {
    #[error("Malformed script: {0}")]
    Structural(String),

    #[error("Opcode requires {0} items on stack")]
    StackUnderflow(usize),

    #[error("Crypto delegate failure: {0}")]
    CryptoDelegate(String),

    #[error("Spend not authorized: {0}")]
    NegativeVerdict(String),

    #[error("Invalid template input: {0}")]
    Construction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl DogeError {
    pub fn structural(message: &str) -> Self {
        DogeError::Structural(message.to_string())
    }

    pub fn crypto(message: &str) -> Self {
        DogeError::CryptoDelegate(message.to_string())
    }

    pub fn negative(message: &str) -> Self {
        DogeError::NegativeVerdict(message.to_string())
    }

    pub fn construction(message: &str) -> Self {
        DogeError::Construction(message.to_string())
    }

    pub fn invalid_input(message: &str) -> Self {
        DogeError::InvalidInput(message.to_string())
    }

    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DogeError::Structural(_) => ErrorKind::Structural,
            DogeError::StackUnderflow(_) => ErrorKind::StackUnderflow,
            DogeError::CryptoDelegate(_) => ErrorKind::CryptoDelegate,
            DogeError::NegativeVerdict(_) => ErrorKind::NegativeVerdict,
            DogeError::Construction(_) => ErrorKind::Construction,
            DogeError::InvalidInput(_)
            | DogeError::Json(_)
            | DogeError::Io(_)
            | DogeError::Hex(_) => ErrorKind::Other,
        }
    }

    /// True when the spend was simply not authorized, as opposed to a
    /// malformed script or a failing delegate.
    pub fn is_negative_verdict(&self) -> bool {
        self.kind() == ErrorKind::NegativeVerdict
    }
}

pub type Result<T> = std::result::Result<T, DogeError>;

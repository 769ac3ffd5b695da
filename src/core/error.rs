use thiserror::Error;

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error("Fragment id generation exhausted: maximum generation frequency exceeded")]
    GenerationExhausted,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Attribute index {index} out of range (attribute count: {count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Book-keeping catalog is sealed: no further modifications permitted")]
    SealedCatalog,

    #[error("Invalid catalog state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt metadata: {0}")]
    CorruptData(String),

    #[error("Invalid magic number in metadata header")]
    InvalidMagic,

    #[error("Unsupported metadata format version: {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("Metadata checksum verification failed")]
    ChecksumMismatch,

    #[error("Invalid fragment name: {0}")]
    InvalidFragmentName(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FragmentError {
    /// True for every error that means the metadata bytes cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            FragmentError::CorruptData(_)
                | FragmentError::InvalidMagic
                | FragmentError::UnsupportedVersion { .. }
                | FragmentError::ChecksumMismatch
        )
    }
}

impl From<toml::de::Error> for FragmentError {
    fn from(e: toml::de::Error) -> Self {
        FragmentError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FragmentError>;

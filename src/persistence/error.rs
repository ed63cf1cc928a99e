use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Why an import was rejected. The store is never touched when this is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid format: expected a JSON array of NPCs")]
    NotAnArray,

    #[error("invalid format: entry {index} {problem}")]
    InvalidEntry { index: usize, problem: &'static str },

    #[error("invalid format: {0}")]
    Shape(serde_json::Error),

    #[error("only .json files can be imported: {0}")]
    NotJsonFile(String),

    #[error("could not read import file: {0}")]
    Read(#[from] std::io::Error),

    #[error("import could not be saved: {0}")]
    Save(#[from] StoreError),
}

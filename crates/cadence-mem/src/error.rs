use thiserror::Error;

/// Result type local to cadence-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory budget exceeded for tag '{tag}': requested {requested} bytes, capacity {capacity}, used {used}")]
    BudgetExceeded {
        tag: &'static str,
        requested: usize,
        capacity: usize,
        used: usize,
    },

    #[error("map is full: {entries} entries after {resizes} resizes (limit {max_resizes})")]
    MapFull {
        entries: usize,
        resizes: u32,
        max_resizes: u32,
    },

    #[error("value access at offset {offset} (+{width}) exceeds value size {size}")]
    ValueOutOfBounds {
        offset: usize,
        width: usize,
        size: usize,
    },

    #[error("entry of {need} bytes does not fit a fresh page of {page} bytes")]
    EntryTooLarge { need: usize, page: usize },

    #[error("invalid map configuration: {0}")]
    Config(String),
}

impl From<cadence_core::error::Error> for Error {
    fn from(e: cadence_core::error::Error) -> Self {
        Error::Config(e.to_string())
    }
}

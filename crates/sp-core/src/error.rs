use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Please enter a YouTube URL")]
    EmptyUrl,

    #[error("Select at least one stem")]
    NoStems,

    #[error("Unknown stem: {0}")]
    UnknownStem(String),
}

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Required argument missing: {0}")]
    MissingArgument(&'static str),

    #[error("CA not yet initialized! Run `caman init` first")]
    NotInitialized,

    #[error("{0} already exists! Use --force to overwrite it")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    #[error("Crypto engine failure: {0}")]
    CryptoEngine(String),

    #[error("Subject template is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Root CA is incomplete: {0} missing. Re-run `caman init --force`")]
    RootIncomplete(&'static str),
}

impl Error {
    /// Process exit code for a reported error. Usage errors (exit code 2)
    /// never reach this type, clap handles them.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<rcgen::Error> for Error {
    fn from(err: rcgen::Error) -> Self {
        Error::CryptoEngine(err.to_string())
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::CryptoEngine(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for Error {
    fn from(err: rsa::pkcs8::Error) -> Self {
        Error::CryptoEngine(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

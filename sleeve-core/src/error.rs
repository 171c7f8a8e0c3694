use std::{error, fmt, io, sync::mpsc};

#[derive(Debug)]
pub enum Error {
    FetchError(Box<dyn error::Error + Send>),
    ParseError(String),
    AuthRequired,
    OAuthError(String),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchError(err) => err.fmt(f),
            Self::ParseError(reason) => write!(f, "Malformed response: {reason}"),
            Self::AuthRequired => write!(f, "Authorization required"),
            Self::OAuthError(reason) => write!(f, "Authorization failed: {reason}"),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Error {
        match err {
            // The API answers calls with a missing or expired token with 401.
            ureq::Error::StatusCode(401) => Error::AuthRequired,
            other => Error::FetchError(Box::new(other)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::ParseError(err.to_string())
    }
}

impl From<mpsc::RecvTimeoutError> for Error {
    fn from(err: mpsc::RecvTimeoutError) -> Error {
        Error::OAuthError(err.to_string())
    }
}

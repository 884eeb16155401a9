use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    /// The API rejected our credentials mid-session (HTTP 401).
    AuthRejected,
    /// No usable refresh token on file; the install flow has to be run.
    NotAuthorized,
    Decode(String),
    Protocol(String),
    BadSample(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::AuthRejected => write!(f, "authentication rejected by the API"),
            Error::NotAuthorized => write!(f, "not authorized; run with --install first"),
            Error::Decode(msg) => write!(f, "decode error: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::BadSample(msg) => write!(f, "bad sensor sample: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The template could not be parsed; nothing was modified.
    DocumentLoad(lopdf::Error),
    Pdf(lopdf::Error),
    FontEmbed { font: String, tried: Vec<String> },
    Image(String),
    Validation(String),
    Mapping(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DocumentLoad(e) => write!(f, "could not load PDF template: {e}"),
            Error::Pdf(e) => write!(f, "PDF error: {e}"),
            Error::FontEmbed { font, tried } => {
                write!(f, "could not embed font {font}")?;
                if !tried.is_empty() {
                    write!(f, " (tried: {})", tried.join(", "))?;
                }
                Ok(())
            }
            Error::Image(reason) => write!(f, "image error: {reason}"),
            Error::Validation(reason) => write!(f, "validation failed: {reason}"),
            Error::Mapping(e) => write!(f, "mapping file error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Mapping(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

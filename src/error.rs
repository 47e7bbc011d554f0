use thiserror::Error;

/// Crate-specific error enum.
#[derive(Debug, Error)]
pub enum Error {
    /// A geometry could not be decoded from its GeoJSON representation.
    #[error("invalid geometry: {0}")]
    Decode(String),

    /// Something the caller asked for was not found, e.g. the collection an
    /// item is being added to.
    #[error("not found: {0}")]
    NotFound(String),

    /// An internal invariant was violated.
    ///
    /// These are bugs, not bad requests.
    #[error("internal error: {0}")]
    Programming(String),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [tokio_postgres::Error]
    #[error(transparent)]
    TokioPostgres(#[from] tokio_postgres::Error),

    /// A search or item failed validation, e.g. a bbox with five elements.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl Error {
    /// Returns the HTTP status code that best describes this error.
    ///
    /// Decode and validation errors are the caller's fault (400), missing
    /// resources are 404, and everything else is a server error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::Error;
    ///
    /// assert_eq!(Error::Validation("bad limit".to_string()).status_code(), 400);
    /// assert_eq!(Error::NotFound("collection".to_string()).status_code(), 404);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Decode(_) | Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// Returns true if this error was caused by the request, not the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

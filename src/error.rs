use thiserror::Error;

/// Where a failure is shown to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Static banner at the top of the timeline, kept for the whole session.
    Banner,
    /// Inline message on the sign-in form.
    Inline,
    /// One-off alert in the status line.
    Alert,
}

#[derive(Error, Debug)]
pub enum DiaryError {
    #[error("Backend is not configured: {0}")]
    Config(String),

    #[error("Cannot reach the diary backend: {0}")]
    Connectivity(String),

    #[error("{0}")]
    Auth(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Could not save entry: {0}")]
    Persist(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Unexpected backend response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A title is required")]
    MissingTitle,

    #[error("Content is required")]
    MissingContent,
}

impl DiaryError {
    pub fn surface(&self) -> Surface {
        match self {
            DiaryError::Config(_) | DiaryError::Connectivity(_) | DiaryError::Decode(_) => {
                Surface::Banner
            }
            DiaryError::Auth(_) => Surface::Inline,
            DiaryError::Upload(_) | DiaryError::Persist(_) | DiaryError::Validation(_) => {
                Surface::Alert
            }
        }
    }
}

impl From<serde_json::Error> for DiaryError {
    fn from(err: serde_json::Error) -> Self {
        DiaryError::Decode(err.to_string())
    }
}

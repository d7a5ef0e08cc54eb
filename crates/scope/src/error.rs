use thiserror::Error;

/// Building the analysis graph failed.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),

    /// A media element can feed only one graph for its whole lifetime.
    #[error("media element {0} is already connected to an audio graph")]
    AlreadyBound(u64),

    #[error("fft size {0} must be a power of two between 32 and 32768")]
    InvalidFftSize(usize),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no source set")]
    NoSource,

    #[error("failed to load {src}: {message}")]
    Decode { src: String, message: String },
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ScopeError>;

pub type ReelResult<T> = Result<T, ReelError>;

#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Malformed input data (query documents, frame buffers, encoder settings).
    #[error("validation error: {0}")]
    Validation(String),

    /// Playback settings rejected before a run starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant broken; aborts the current run.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// A canvas primitive was asked to do something impossible with a mark.
    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ReelError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            ReelError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            ReelError::consistency("x")
                .to_string()
                .contains("consistency error:")
        );
        assert!(ReelError::geometry("x").to_string().contains("geometry error:"));
        assert!(ReelError::render("x").to_string().contains("render error:"));
        assert!(ReelError::encode("x").to_string().contains("encode error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}

use std::sync::Arc;

pub type ClockResult<T> = Result<T, ClockError>;

#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("layout config error: {0}")]
    LayoutConfig(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("svg processing error: {0}")]
    SvgProcessing(String),

    /// A failure observed by a cache waiter. The computation that produced it
    /// ran once; every caller blocked on the same key receives this same
    /// underlying error.
    #[error(transparent)]
    Shared(Arc<ClockError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClockError {
    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound(name.into())
    }

    pub fn layout_config(msg: impl Into<String>) -> Self {
        Self::LayoutConfig(msg.into())
    }

    pub fn invalid_timezone(tz: impl Into<String>) -> Self {
        Self::InvalidTimezone(tz.into())
    }

    pub fn missing_field(placeholder: impl Into<String>) -> Self {
        Self::MissingField(placeholder.into())
    }

    pub fn svg_processing(msg: impl Into<String>) -> Self {
        Self::SvgProcessing(msg.into())
    }
}

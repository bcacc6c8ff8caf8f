use crate::error::ServiceError;
use crate::export::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Where a notice is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeStyle {
    /// Next to the form field or form that failed.
    Inline,
    /// Blocking dialog, used for list operations.
    Alert,
    /// Transient, non-blocking.
    Toast,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub style: NoticeStyle,
    pub message: String,
    pub code: Option<String>,
}

impl Notice {
    pub fn inline(err: &ServiceError) -> Self {
        Self::error(NoticeStyle::Inline, err)
    }

    pub fn alert(err: &ServiceError) -> Self {
        Self::error(NoticeStyle::Alert, err)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            style: NoticeStyle::Toast,
            message: message.into(),
            code: None,
        }
    }

    /// An empty export is informational; anything else is an error alert.
    pub fn for_export(err: &ExportError) -> Self {
        match err {
            ExportError::NoData => Self::info(err.to_string()),
            ExportError::Io { .. } => Self::alert(&ServiceError::new("export", err.to_string())),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.style == NoticeStyle::Alert
    }

    fn error(style: NoticeStyle, err: &ServiceError) -> Self {
        Self {
            level: NoticeLevel::Error,
            style,
            message: err.message.clone(),
            code: Some(err.code.clone()),
        }
    }
}

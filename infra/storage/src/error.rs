use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
#[shelf_derive::shelf_error]
pub enum StorageError {
    #[error("Validation failed{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Credential rejected{}: {message}", format_context(.context))]
    Auth { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path traversal security violation{}: {message}", format_context(.context))]
    PathTraversal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Cast not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid cast token{}: {message}", format_context(.context))]
    InvalidToken { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed cast header{}: {message}", format_context(.context))]
    Parse { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl StorageError {
    pub(crate) fn validation(
        message: impl Into<Cow<'static, str>>,
        context: &'static str,
    ) -> Self {
        Self::Validation { message: message.into(), context: Some(context.into()) }
    }

    pub(crate) fn auth(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Auth { message: message.into(), context: None }
    }

    pub(crate) fn traversal(
        message: impl Into<Cow<'static, str>>,
        context: &'static str,
    ) -> Self {
        Self::PathTraversal { message: message.into(), context: Some(context.into()) }
    }

    pub(crate) fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: message.into(), context: None }
    }

    pub(crate) fn invalid_token(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidToken { message: message.into(), context: None }
    }

    pub(crate) fn parse(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Parse { message: message.into(), context: None }
    }

    /// Maps `NotFound` I/O errors to [`StorageError::NotFound`], everything else to `Io`.
    pub(crate) fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path.display().to_string())
        } else {
            Self::Io { source: err, context: Some(path.display().to_string().into()) }
        }
    }
}

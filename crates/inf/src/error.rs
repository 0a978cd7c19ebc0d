use std::fmt;

use thiserror::Error as ThisError;

/// The closed set of error kinds the core can raise.
///
/// Callers match on the kind, not on the message, so the message text is
/// free to evolve.
#[derive(ThisError, Debug)]
pub enum ErrorKind {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Size mismatch: {0}")]
    SizeMismatch(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("File format error: {0}")]
    FileFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Internal logic error: {0}")]
    InternalLogic(String),
}

/// Contextual fields that can be attached to an error as it propagates up
/// through layers. Each layer fills in whatever it knows and leaves fields
/// set by inner layers untouched, so the innermost, most specific detail
/// always survives.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file: Option<String>,
    pub tag: Option<String>,
    pub date: Option<i64>,
    pub size: Option<(usize, usize)>,
    pub r#type: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        let mut sep = |f: &mut fmt::Formatter<'_>, wrote: &mut bool| -> fmt::Result {
            if *wrote {
                write!(f, ", ")
            } else {
                write!(f, " [")?;
                *wrote = true;
                Ok(())
            }
        };

        if let Some(file) = &self.file {
            sep(f, &mut wrote)?;
            write!(f, "file={file}")?;
        }
        if let Some(tag) = &self.tag {
            sep(f, &mut wrote)?;
            write!(f, "tag={tag}")?;
        }
        if let Some(date) = &self.date {
            sep(f, &mut wrote)?;
            write!(f, "date={date}")?;
        }
        if let Some((w, h)) = &self.size {
            sep(f, &mut wrote)?;
            write!(f, "size={w}x{h}")?;
        }
        if let Some(ty) = &self.r#type {
            sep(f, &mut wrote)?;
            write!(f, "type={ty}")?;
        }
        if wrote {
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[derive(ThisError, Debug)]
#[error("{kind}{context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: ErrorContext,
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound(msg.into()))
    }

    pub fn size_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SizeMismatch(msg.into()))
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch(msg.into()))
    }

    pub fn file_format(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::FileFormat(msg.into()))
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented(msg.into()))
    }

    pub fn internal_logic(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalLogic(msg.into()))
    }

    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: ErrorContext::default(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(e))
    }
}

/// Extension trait used by every layer to annotate an already-raised error
/// with context before re-raising it. Never overwrites a field a deeper
/// layer already set.
pub trait Context<T> {
    fn context_file(self, file: impl Into<String>) -> Result<T>;
    fn context_tag(self, tag: impl Into<String>) -> Result<T>;
    fn context_date(self, date: i64) -> Result<T>;
    fn context_size(self, size: (usize, usize)) -> Result<T>;
    fn context_type(self, ty: impl Into<String>) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context_file(self, file: impl Into<String>) -> Result<T> {
        self.map_err(|mut e| {
            e.context.file.get_or_insert_with(|| file.into());
            e
        })
    }

    fn context_tag(self, tag: impl Into<String>) -> Result<T> {
        self.map_err(|mut e| {
            e.context.tag.get_or_insert_with(|| tag.into());
            e
        })
    }

    fn context_date(self, date: i64) -> Result<T> {
        self.map_err(|mut e| {
            e.context.date.get_or_insert(date);
            e
        })
    }

    fn context_size(self, size: (usize, usize)) -> Result<T> {
        self.map_err(|mut e| {
            e.context.size.get_or_insert(size);
            e
        })
    }

    fn context_type(self, ty: impl Into<String>) -> Result<T> {
        self.map_err(|mut e| {
            e.context.r#type.get_or_insert_with(|| ty.into());
            e
        })
    }
}

pub type Result<T = ()> = std::result::Result<T, Error>;

use thiserror::Error;

/// Which blob of a package an offset refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PackageFile {
    /// Summary plus name/import/export tables (`.uasset`)
    Uasset,
    /// Serialized export data (`.uexp`)
    Uexp,
    /// Scratch buffer used while measuring a value before it is emitted
    Scratch,
}

impl std::fmt::Display for PackageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PackageFile::Uasset => "uasset",
            PackageFile::Uexp => "uexp",
            PackageFile::Scratch => "scratch",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid package magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("malformed package: {0}")]
    Format(String),
    #[error("property kind {0:?} is not supported")]
    UnsupportedPropertyKind(String),
    #[error("size mismatch for {context}: declared {declared} bytes, encoded {actual} bytes")]
    SizeMismatch {
        context: String,
        declared: i64,
        actual: i64,
    },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("name index {index} out of range for name table of {len} entries")]
    InvalidNameIndex { index: i32, len: usize },
    #[error("name {0:?} is not present in the name table")]
    NameNotFound(String),
    #[error("unsupported FText history type {0}")]
    UnsupportedTextHistory(i8),
    #[error("invalid bool value {0}")]
    InvalidBool(u32),
    #[error("invalid UTF-16 string: {0}")]
    Utf16(#[from] std::string::FromUtf16Error),
    #[error("property {name:?} ({kind}): {source}")]
    Property {
        name: String,
        kind: String,
        #[source]
        source: Box<Error>,
    },
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }
    pub(crate) fn type_mismatch(
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
    /// Innermost error, skipping any [`Error::Property`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Property { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Error, Debug)]
#[error("at {file} offset {offset}: {error}")]
pub struct ParseError {
    pub offset: usize,
    pub file: PackageFile,
    pub error: Error,
}

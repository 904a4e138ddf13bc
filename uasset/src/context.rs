use std::{
    cell::RefCell,
    collections::HashMap,
    io::{Cursor, Read, Seek, Write},
    rc::Rc,
};

use serde::Serialize;

use crate::{error::PackageFile, property::StructType, tables::PackageTables, Result};

/// Used to disambiguate struct types within a set or map during parsing.
///
/// Set and map elements carry no per-element tag, so a struct element's type
/// cannot be recovered from the stream. Paths are dotted property names
/// starting with the export's object name; map keys and values are addressed
/// with a trailing `.Key` / `.Value`, e.g. `MyAsset.Loadout.Value`.
#[derive(Debug, Default, Clone)]
pub struct Types {
    types: HashMap<String, StructType>,
}
impl Types {
    /// Create an empty set of type hints
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a new type at the given path
    pub fn add(&mut self, path: impl Into<String>, t: StructType) {
        self.types.insert(path.into(), t);
    }
}

/// Represents the current position in the property hierarchy as a stack of names.
/// Used for looking up type hints in the Types map and for diagnostic context.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    components: Vec<String>,
}

impl Scope {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    fn path(&self) -> String {
        self.components.join(".")
    }

    fn push(&mut self, name: &str) {
        self.components.push(name.to_string());
    }

    fn pop(&mut self) {
        self.components.pop();
    }
}

/// Auxiliary blobs that can be attached to the export data cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadType {
    /// Bulk data stored next to the package (`.ubulk`)
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// Property kind name not recognized; value skipped using its declared size
    UnknownPropertyKind,
    /// Decoded property length differed from the size declared in its tag
    PropertySizeMismatch,
    /// Generated class export whose template class could not be resolved
    UnresolvedTypeReference,
    /// Export reader consumed a different number of bytes than `serial_size`
    ExportSizeMismatch,
    /// Bytes left in an export after its properties, preserved verbatim
    TrailingBytes,
    /// No struct type hint for a set or map element; a default was assumed
    StructTypeAssumed,
    /// Same property name and array index seen twice in one list
    DuplicateProperty,
    /// Cross-export reference that could not be linked
    UnresolvedLink,
    /// Enum label without a known variant
    UnknownEnumValue,
}

/// A recoverable issue found while parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: PackageFile,
    pub offset: u64,
    /// Dotted property path at which the issue was found, empty at the top level
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} offset {}: ", self.file, self.offset)?;
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path)?;
        }
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Diagnostics(Vec<Diagnostic>);
impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic, log: bool) {
        if log {
            tracing::warn!("{diagnostic}");
        } else {
            tracing::debug!("{diagnostic}");
        }
        self.0.push(diagnostic);
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }
}
impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Cursor over one package blob together with the state shared by every
/// cursor of the same package.
#[derive(Debug)]
pub struct Context<S> {
    pub(crate) stream: S,
    pub(crate) state: ContextState,
}

/// Cursor over an export data blob.
pub type AssetReader<'a> = Context<Cursor<&'a [u8]>>;
/// Growable output cursor.
pub type AssetWriter = Context<Cursor<Vec<u8>>>;

#[derive(Debug, Clone)]
pub(crate) struct ContextState {
    pub(crate) file: PackageFile,
    pub(crate) tables: Rc<PackageTables>,
    pub(crate) types: Rc<Types>,
    pub(crate) payloads: HashMap<PayloadType, Rc<[u8]>>,
    pub(crate) scope: Scope,
    pub(crate) diagnostics: Rc<RefCell<Diagnostics>>,
    pub(crate) log: bool,
}
impl ContextState {
    pub(crate) fn new(file: PackageFile) -> Self {
        Self {
            file,
            tables: Rc::new(PackageTables::default()),
            types: Rc::new(Types::new()),
            payloads: HashMap::new(),
            scope: Scope::root(),
            diagnostics: Rc::new(RefCell::new(Diagnostics::default())),
            log: false,
        }
    }
    pub(crate) fn scratch(&self) -> Self {
        Self {
            file: PackageFile::Scratch,
            ..self.clone()
        }
    }
}

impl<R: Read> Read for Context<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}
impl<S: Seek> Seek for Context<S> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.stream.seek(pos)
    }
}
impl<W: Write + Seek> Write for Context<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl<S> Context<S> {
    pub(crate) fn new(stream: S, state: ContextState) -> Self {
        Self { stream, state }
    }
    pub(crate) fn with_scope<F, T>(&mut self, name: &str, f: F) -> T
    where
        F: FnOnce(&mut Context<S>) -> T,
    {
        self.state.scope.push(name);
        let result = f(self);
        self.state.scope.pop();
        result
    }
    pub(crate) fn path(&self) -> String {
        self.state.scope.path()
    }
    fn get_type(&self) -> Option<&StructType> {
        self.state.types.types.get(&self.path())
    }
    pub(crate) fn log(&self) -> bool {
        self.state.log
    }
    pub fn tables(&self) -> &PackageTables {
        &self.state.tables
    }
    pub(crate) fn into_inner(self) -> S {
        self.stream
    }
}
impl<S: Seek> Context<S> {
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.stream.stream_position()?)
    }
    pub(crate) fn report(&mut self, kind: DiagnosticKind, message: String) -> Result<()> {
        let diagnostic = Diagnostic {
            kind,
            file: self.state.file,
            offset: self.stream.stream_position()?,
            path: self.path(),
            message,
        };
        self.state
            .diagnostics
            .borrow_mut()
            .push(diagnostic, self.state.log);
        Ok(())
    }
    pub(crate) fn get_type_or(&mut self, t: &StructType) -> Result<StructType> {
        if let Some(found) = self.get_type().cloned() {
            return Ok(found);
        }
        self.report(
            DiagnosticKind::StructTypeAssumed,
            format!("StructType for {:?} unspecified, assuming {:?}", self.path(), t),
        )?;
        Ok(t.clone())
    }
}

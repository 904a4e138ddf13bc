use std::{
    cell::RefCell,
    io::{Cursor, Seek, SeekFrom, Write},
    rc::Rc,
};

use byteorder::{WriteBytesExt, LE};
use tracing::instrument;

use crate::{
    context::{
        AssetReader, AssetWriter, Context, ContextState, DiagnosticKind, Diagnostics, PayloadType,
        Types,
    },
    error::{Error, PackageFile, ParseError},
    export::{Export, ExportContext, ExportRegistry, Localization, Siblings},
    read_array,
    summary::{FPackageFileSummary, PACKAGE_MAGIC},
    tables::{FName, FNameEntry, FObjectExport, FObjectImport, FPackageIndex, PackageTables},
    Result,
};

/// Summary and tables of a package, read from the `.uasset` blob alone.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageHeader {
    pub summary: FPackageFileSummary,
    pub tables: PackageTables,
}

fn seek_table(ar: &mut AssetReader<'_>, what: &str, offset: i32) -> Result<()> {
    let offset = u64::try_from(offset)
        .map_err(|_| Error::format(format!("negative {what} table offset {offset}")))?;
    ar.seek(SeekFrom::Start(offset))?;
    Ok(())
}

impl PackageHeader {
    #[instrument(name = "PackageHeader_read", skip_all)]
    pub fn read(uasset: &[u8]) -> Result<Self, ParseError> {
        let mut ar = Context::new(Cursor::new(uasset), ContextState::new(PackageFile::Uasset));
        let result = Self::read_tables(&mut ar);
        result.map_err(|error| ParseError {
            offset: ar.stream.position() as usize,
            file: PackageFile::Uasset,
            error,
        })
    }

    fn read_tables(ar: &mut AssetReader<'_>) -> Result<Self> {
        let summary = FPackageFileSummary::read(ar)?;

        seek_table(ar, "name", summary.name_offset)?;
        let names = read_array(summary.name_count as u32, ar, FNameEntry::read)?;
        ar.state.tables = Rc::new(PackageTables {
            names,
            ..Default::default()
        });

        seek_table(ar, "import", summary.import_offset)?;
        let imports = read_array(summary.import_count as u32, ar, FObjectImport::read)?;
        seek_table(ar, "export", summary.export_offset)?;
        let exports = read_array(summary.export_count as u32, ar, FObjectExport::read)?;

        let names = Rc::try_unwrap(std::mem::take(&mut ar.state.tables))
            .unwrap_or_else(|rc| (*rc).clone())
            .names;
        Ok(Self {
            summary,
            tables: PackageTables {
                names,
                imports,
                exports,
            },
        })
    }
}

/// Output of [`Package::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageBuffers {
    pub uasset: Vec<u8>,
    pub uexp: Vec<u8>,
    pub ubulk: Option<Vec<u8>>,
}

/// A parsed package: summary, tables and the exports built from them.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub summary: FPackageFileSummary,
    tables: Rc<PackageTables>,
    exports: Vec<Box<dyn Export>>,
    bulk: Option<Vec<u8>>,
    diagnostics: Diagnostics,
    log: bool,
}

impl Package {
    /// Empty package with a default summary, to be filled through
    /// [`Package::add_name`], [`Package::add_import`] and [`Package::push_export`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: FPackageFileSummary::default(),
            tables: Rc::new(PackageTables::default()),
            exports: vec![],
            bulk: None,
            diagnostics: Diagnostics::default(),
            log: false,
        }
    }

    /// Reads a package with the builtin export classes and no struct hints.
    pub fn read(
        name: impl Into<String>,
        uasset: &[u8],
        uexp: &[u8],
        ubulk: Option<&[u8]>,
    ) -> Result<Self, ParseError> {
        PackageReader::new().read(name, uasset, uexp, ubulk)
    }

    pub fn exports(&self) -> &[Box<dyn Export>] {
        &self.exports
    }
    pub fn exports_mut(&mut self) -> &mut [Box<dyn Export>] {
        &mut self.exports
    }
    pub fn export(&self, index: usize) -> Option<&dyn Export> {
        self.exports.get(index).map(|e| e.as_ref())
    }
    pub fn export_mut(&mut self, index: usize) -> Option<&mut dyn Export> {
        match self.exports.get_mut(index) {
            Some(export) => Some(export.as_mut()),
            None => None,
        }
    }
    /// Class name export `index` was dispatched on.
    pub fn export_type(&self, index: usize) -> Option<&str> {
        self.exports.get(index).map(|e| e.export_type())
    }
    pub fn exports_of_type<T: Export>(&self) -> impl Iterator<Item = &T> {
        self.exports
            .iter()
            .filter_map(|e| e.as_any().downcast_ref::<T>())
    }
    /// First export of type `T`.
    pub fn export_of_type<T: Export>(&self) -> Option<&T> {
        self.exports_of_type().next()
    }
    pub fn export_of_type_mut<T: Export>(&mut self) -> Option<&mut T> {
        self.exports
            .iter_mut()
            .find_map(|e| e.as_any_mut().downcast_mut::<T>())
    }
    pub fn tables(&self) -> &PackageTables {
        &self.tables
    }
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    pub fn bulk(&self) -> Option<&[u8]> {
        self.bulk.as_deref()
    }

    /// Adds `name` to the name table unless already present.
    pub fn add_name(&mut self, name: &str) -> FName {
        if self.tables.find_name(name).is_none() {
            Rc::make_mut(&mut self.tables)
                .names
                .push(FNameEntry::new(name));
            self.summary.name_count += 1;
        }
        FName::new(name)
    }
    pub fn add_import(&mut self, import: FObjectImport) -> FPackageIndex {
        let tables = Rc::make_mut(&mut self.tables);
        tables.imports.push(import);
        self.summary.import_count += 1;
        FPackageIndex::from_import(tables.imports.len() - 1)
    }
    /// Appends an export together with its table entry.
    pub fn push_export(&mut self, entry: FObjectExport, export: Box<dyn Export>) -> usize {
        Rc::make_mut(&mut self.tables).exports.push(entry);
        self.summary.export_count += 1;
        self.exports.push(export);
        self.exports.len() - 1
    }
    pub fn set_bulk(&mut self, bulk: Option<Vec<u8>>) {
        self.bulk = bulk;
    }
    pub fn apply_localization(&mut self, localization: &Localization) {
        for export in &mut self.exports {
            export.apply_localization(localization);
        }
    }

    /// Runs [`Export::resolve_links`] on every export. Called once after
    /// reading; call again after adding or replacing exports.
    pub fn resolve_links(&mut self) -> Result<()> {
        let header_size = self.summary.total_header_size as i64;
        for index in 0..self.exports.len() {
            let (before, rest) = self.exports.split_at_mut(index);
            let Some((current, after)) = rest.split_first_mut() else {
                break;
            };
            let (offset, path) = match self.tables.exports.get(index) {
                Some(entry) => (
                    (entry.serial_offset - header_size).max(0) as u64,
                    entry.object_name.to_string(),
                ),
                None => (0, String::new()),
            };
            let siblings = Siblings::new(before, after, &self.tables, offset, path);
            current.resolve_links(&siblings)?;
            for diagnostic in siblings.into_diagnostics() {
                self.diagnostics.push(diagnostic, self.log);
            }
        }
        Ok(())
    }

    fn writer(&self, file: PackageFile) -> AssetWriter {
        let mut state = ContextState::new(file);
        state.tables = self.tables.clone();
        state.log = self.log;
        Context::new(Cursor::new(vec![]), state)
    }

    fn check_counts(&self) -> Result<()> {
        for (what, declared, actual) in [
            ("name", self.summary.name_count, self.tables.names.len()),
            ("import", self.summary.import_count, self.tables.imports.len()),
            ("export", self.summary.export_count, self.tables.exports.len()),
        ] {
            if usize::try_from(declared).ok() != Some(actual) {
                return Err(Error::format(format!(
                    "summary declares {declared} {what}s but the {what} table has {actual} entries"
                )));
            }
        }
        if self.exports.len() != self.tables.exports.len() {
            return Err(Error::format(format!(
                "{} exports for {} export table entries",
                self.exports.len(),
                self.tables.exports.len()
            )));
        }
        Ok(())
    }

    /// Lays the header out back to back into a scratch buffer and stores
    /// the resulting table offsets and header size in the summary.
    fn update_header(&mut self) -> Result<()> {
        let mut ar = self.writer(PackageFile::Scratch);
        self.summary.write(&mut ar)?;
        let name_offset = ar.position()?;
        for name in &self.tables.names {
            name.write(&mut ar)?;
        }
        let import_offset = ar.position()?;
        for import in &self.tables.imports {
            import.write(&mut ar)?;
        }
        let export_offset = ar.position()?;
        for export in &self.tables.exports {
            export.write(&mut ar)?;
        }
        let total_header_size = ar.position()?;

        self.summary.name_offset = header_offset(name_offset)?;
        self.summary.import_offset = header_offset(import_offset)?;
        self.summary.export_offset = header_offset(export_offset)?;
        self.summary.total_header_size = header_offset(total_header_size)?;
        Ok(())
    }

    /// Serializes the package. Export table entries get the offset and size
    /// each export was actually written at.
    #[instrument(name = "Package_write", skip_all)]
    pub fn write(&mut self) -> Result<PackageBuffers> {
        self.check_counts()?;
        self.update_header()?;
        let header_size = self.summary.total_header_size as i64;

        let mut uexp = self.writer(PackageFile::Uexp);
        let mut placements = Vec::with_capacity(self.exports.len());
        for export in &self.exports {
            let start = uexp.position()?;
            export.write(&mut uexp)?;
            placements.push((start, uexp.position()? - start));
        }
        uexp.write_u32::<LE>(PACKAGE_MAGIC)?;
        let uexp = uexp.into_inner().into_inner();

        let tables = Rc::make_mut(&mut self.tables);
        for (entry, (start, size)) in tables.exports.iter_mut().zip(placements) {
            entry.serial_offset = header_size + start as i64;
            entry.serial_size = size as i64;
        }

        let mut uasset = self.writer(PackageFile::Uasset);
        self.summary.write(&mut uasset)?;
        pad_to(&mut uasset, "name", self.summary.name_offset)?;
        for name in &self.tables.names {
            name.write(&mut uasset)?;
        }
        pad_to(&mut uasset, "import", self.summary.import_offset)?;
        for import in &self.tables.imports {
            import.write(&mut uasset)?;
        }
        pad_to(&mut uasset, "export", self.summary.export_offset)?;
        for export in &self.tables.exports {
            export.write(&mut uasset)?;
        }

        Ok(PackageBuffers {
            uasset: uasset.into_inner().into_inner(),
            uexp,
            ubulk: self.bulk.clone(),
        })
    }
}

fn header_offset(position: u64) -> Result<i32> {
    i32::try_from(position)
        .map_err(|_| Error::format(format!("header offset {position} overflows")))
}

fn pad_to(ar: &mut AssetWriter, what: &str, offset: i32) -> Result<()> {
    let position = ar.position()? as i64;
    let padding = offset as i64 - position;
    if padding < 0 {
        return Err(Error::format(format!(
            "{what} table offset {offset} lies before the end of the preceding data at {position}"
        )));
    }
    ar.write_all(&vec![0; padding as usize])?;
    Ok(())
}

/// Class name the factory for `export` is looked up by.
fn dispatch_type(ar: &mut AssetReader<'_>, export: &FObjectExport) -> Result<String> {
    let tables = ar.state.tables.clone();
    let class = tables
        .object_name(export.class_index)
        .map(FName::as_str)
        .unwrap_or("Class");
    let class = class.strip_prefix("Default__").unwrap_or(class);
    if class == "BlueprintGeneratedClass" {
        if let Some(template_class) = tables.class_name(export.template_index) {
            return Ok(template_class.to_string());
        }
        ar.report(
            DiagnosticKind::UnresolvedTypeReference,
            format!(
                "template class of generated class {} not found, reading as {class}",
                export.object_name
            ),
        )?;
    }
    Ok(class.to_string())
}

fn read_exports(
    ar: &mut AssetReader<'_>,
    summary: &FPackageFileSummary,
    registry: &ExportRegistry,
) -> Result<Vec<Box<dyn Export>>> {
    let tables = ar.state.tables.clone();
    let data_len = ar.stream.get_ref().len() as i64;
    let mut exports = Vec::with_capacity(tables.exports.len());
    for (index, entry) in tables.exports.iter().enumerate() {
        let start = entry.serial_offset - summary.total_header_size as i64;
        let end = start.checked_add(entry.serial_size);
        if start < 0 || entry.serial_size < 0 || end.map_or(true, |end| end > data_len) {
            return Err(Error::format(format!(
                "export {} spans {}+{} outside the {data_len} byte export data",
                entry.object_name, start, entry.serial_size
            )));
        }
        ar.seek(SeekFrom::Start(start as u64))?;

        let export_type = dispatch_type(ar, entry)?;
        let context = ExportContext {
            index,
            export: entry,
            export_type: &export_type,
        };
        let factory = registry.get(&export_type);
        let export = ar.with_scope(entry.object_name.as_str(), |ar| factory(ar, &context))?;

        let consumed = ar.position()? as i64 - start;
        if consumed != entry.serial_size {
            ar.report(
                DiagnosticKind::ExportSizeMismatch,
                format!(
                    "{export_type} {} consumed {consumed} of {} bytes",
                    entry.object_name, entry.serial_size
                ),
            )?;
            ar.seek(SeekFrom::Start((start + entry.serial_size) as u64))?;
        }
        exports.push(export);
    }
    Ok(exports)
}

/// Configures how a package is read.
pub struct PackageReader<'r> {
    log: bool,
    types: Option<Rc<Types>>,
    registry: &'r ExportRegistry,
}
impl Default for PackageReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}
impl PackageReader<'static> {
    pub fn new() -> Self {
        Self {
            log: false,
            types: None,
            registry: ExportRegistry::global(),
        }
    }
}
impl<'r> PackageReader<'r> {
    /// Emit diagnostics as warnings instead of debug events.
    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }
    /// Struct type hints for set and map elements.
    pub fn types(mut self, types: Types) -> Self {
        self.types = Some(Rc::new(types));
        self
    }
    pub fn registry<'a>(self, registry: &'a ExportRegistry) -> PackageReader<'a> {
        PackageReader {
            log: self.log,
            types: self.types,
            registry,
        }
    }

    #[instrument(name = "Package_read", skip_all)]
    pub fn read(
        self,
        name: impl Into<String>,
        uasset: &[u8],
        uexp: &[u8],
        ubulk: Option<&[u8]>,
    ) -> Result<Package, ParseError> {
        let name = name.into();
        let PackageHeader { summary, tables } = PackageHeader::read(uasset)?;
        let tables = Rc::new(tables);

        let mut state = ContextState::new(PackageFile::Uexp);
        state.tables = tables.clone();
        state.types = self.types.unwrap_or_else(|| Rc::new(Types::new()));
        state.log = self.log;
        if let Some(bulk) = ubulk {
            state.payloads.insert(PayloadType::Bulk, Rc::from(bulk));
        }
        let diagnostics = state.diagnostics.clone();

        let mut reader = Context::new(Cursor::new(uexp), state);
        let exports = read_exports(&mut reader, &summary, self.registry).map_err(|error| {
            ParseError {
                offset: reader.stream.position() as usize,
                file: PackageFile::Uexp,
                error,
            }
        })?;
        drop(reader);

        let diagnostics = Rc::try_unwrap(diagnostics)
            .map(RefCell::into_inner)
            .unwrap_or_else(|rc| rc.borrow().clone());
        let mut package = Package {
            name,
            summary,
            tables,
            exports,
            bulk: ubulk.map(<[u8]>::to_vec),
            diagnostics,
            log: self.log,
        };
        package.resolve_links().map_err(|error| ParseError {
            offset: 0,
            file: PackageFile::Uexp,
            error,
        })?;
        if self.log {
            tracing::info!(
                "parsed package {} with {} exports and {} diagnostics",
                package.name,
                package.exports.len(),
                package.diagnostics.len()
            );
        }
        Ok(package)
    }
}

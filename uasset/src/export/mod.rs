//! Typed views over package exports.
//!
//! Each export's data is handed to a factory chosen by its class name through
//! an [`ExportRegistry`]. Classes without a registered factory are read as a
//! [`UObject`]. After every export is constructed, [`Export::resolve_links`]
//! runs once per export with a [`Siblings`] view of the others so references
//! between exports can be turned into arena indices.

mod character;
mod object;

pub use character::{CharacterAbilityUIData, CharacterUIData, ECharacterAbilitySlot};
pub use object::UObject;

use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    fmt::Debug,
    sync::OnceLock,
};

use crate::{
    context::{AssetReader, AssetWriter, Diagnostic, DiagnosticKind},
    error::PackageFile,
    property::FText,
    tables::{FObjectExport, PackageTables},
    FTextHistory, Properties, Result,
};

pub trait Export: Any + Debug {
    /// Class name the export was dispatched on.
    fn export_type(&self) -> &str;
    fn properties(&self) -> &Properties;
    fn properties_mut(&mut self) -> &mut Properties;
    /// Writes the export data. The output must be readable by the factory
    /// that produced this export.
    fn write(&self, ar: &mut AssetWriter) -> Result<()>;
    /// Resolves references to other exports of the same package.
    fn resolve_links(&mut self, _siblings: &Siblings<'_>) -> Result<()> {
        Ok(())
    }
    fn apply_localization(&mut self, _localization: &Localization) {}
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a factory knows about the export it is reading.
#[derive(Debug, Clone, Copy)]
pub struct ExportContext<'a> {
    /// Position of the export in the export table
    pub index: usize,
    pub export: &'a FObjectExport,
    /// Dispatch key the factory was chosen by
    pub export_type: &'a str,
}

/// Constructs an export from its data. The cursor starts at the beginning of
/// the export and should end at `serial_offset + serial_size`.
pub type ExportFactory = fn(&mut AssetReader<'_>, &ExportContext<'_>) -> Result<Box<dyn Export>>;

fn read_uobject(ar: &mut AssetReader<'_>, context: &ExportContext<'_>) -> Result<Box<dyn Export>> {
    Ok(Box::new(UObject::read(ar, context)?))
}
fn read_character_ui_data(
    ar: &mut AssetReader<'_>,
    context: &ExportContext<'_>,
) -> Result<Box<dyn Export>> {
    Ok(Box::new(CharacterUIData::read(ar, context)?))
}
fn read_character_ability_ui_data(
    ar: &mut AssetReader<'_>,
    context: &ExportContext<'_>,
) -> Result<Box<dyn Export>> {
    Ok(Box::new(CharacterAbilityUIData::read(ar, context)?))
}

/// Export class name to factory table.
#[derive(Debug, Clone)]
pub struct ExportRegistry {
    factories: HashMap<String, ExportFactory>,
    fallback: ExportFactory,
}
impl Default for ExportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
impl ExportRegistry {
    /// Registry that reads everything as [`UObject`].
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            fallback: read_uobject,
        }
    }
    /// Registry with the export classes this crate knows about.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("CharacterUIData", read_character_ui_data);
        registry.register("CharacterAbilityUIData", read_character_ability_ui_data);
        registry
    }
    /// Shared registry with the builtin classes.
    pub fn global() -> &'static ExportRegistry {
        static REGISTRY: OnceLock<ExportRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::with_builtins)
    }
    /// Registers `factory` for `export_type`, returning the factory it replaced.
    pub fn register(
        &mut self,
        export_type: impl Into<String>,
        factory: ExportFactory,
    ) -> Option<ExportFactory> {
        self.factories.insert(export_type.into(), factory)
    }
    pub fn contains(&self, export_type: &str) -> bool {
        self.factories.contains_key(export_type)
    }
    /// Factory for `export_type`, or the [`UObject`] fallback.
    pub fn get(&self, export_type: &str) -> ExportFactory {
        self.factories
            .get(export_type)
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// The other exports of a package, seen from the export being linked.
pub struct Siblings<'a> {
    before: &'a [Box<dyn Export>],
    after: &'a [Box<dyn Export>],
    tables: &'a PackageTables,
    offset: u64,
    path: String,
    diagnostics: RefCell<Vec<Diagnostic>>,
}
impl<'a> Siblings<'a> {
    pub(crate) fn new(
        before: &'a [Box<dyn Export>],
        after: &'a [Box<dyn Export>],
        tables: &'a PackageTables,
        offset: u64,
        path: String,
    ) -> Self {
        Self {
            before,
            after,
            tables,
            offset,
            path,
            diagnostics: RefCell::new(vec![]),
        }
    }
    /// Arena index of the export being linked.
    pub fn current_index(&self) -> usize {
        self.before.len()
    }
    pub fn len(&self) -> usize {
        self.before.len() + 1 + self.after.len()
    }
    pub fn is_empty(&self) -> bool {
        false
    }
    /// Export at arena index `index`. The current export is not reachable
    /// through its own siblings.
    pub fn get(&self, index: usize) -> Option<&dyn Export> {
        let current = self.current_index();
        if index < current {
            self.before.get(index).map(|e| e.as_ref())
        } else if index == current {
            None
        } else {
            self.after.get(index - current - 1).map(|e| e.as_ref())
        }
    }
    pub fn get_as<T: Export>(&self, index: usize) -> Option<&T> {
        self.get(index)?.as_any().downcast_ref::<T>()
    }
    pub fn tables(&self) -> &PackageTables {
        self.tables
    }
    pub fn report(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.borrow_mut().push(Diagnostic {
            kind,
            file: PackageFile::Uexp,
            offset: self.offset,
            path: self.path.clone(),
            message: message.into(),
        });
    }
    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }
}

/// Localized strings keyed by text namespace and key.
#[derive(Debug, Default, Clone)]
pub struct Localization {
    entries: HashMap<String, HashMap<String, String>>,
}
impl Localization {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.entries
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), text.into());
    }
    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.entries.get(namespace)?.get(key).map(String::as_str)
    }
    /// Sets the displayed string of `text` if an entry exists for it.
    pub fn localize(&self, text: &mut FText) -> bool {
        let FTextHistory::Base { namespace, key, .. } = &text.history else {
            return false;
        };
        match self.get(namespace.as_str(), key.as_str()) {
            Some(localized) => {
                text.localized = Some(localized.to_string());
                true
            }
            None => false,
        }
    }
}

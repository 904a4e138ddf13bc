use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::{Serialize, Serializer};
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    Error, FGuid, FString, Result,
};

/// Reference to an entry of the package name table.
///
/// Two names compare equal when their text is equal; the index is only a
/// hint used to write the name back to the slot it was read from.
#[derive(Debug, Clone, Default)]
pub struct FName {
    text: String,
    index: Option<u32>,
}
impl FName {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            index: None,
        }
    }
    pub fn none() -> Self {
        Self::new("None")
    }
    pub fn as_str(&self) -> &str {
        &self.text
    }
    pub fn is_none(&self) -> bool {
        self.text == "None"
    }
    /// Name table slot this name was read from, if any.
    pub fn index(&self) -> Option<u32> {
        self.index
    }
}
impl PartialEq for FName {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for FName {}
impl std::hash::Hash for FName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state)
    }
}
impl PartialEq<str> for FName {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}
impl PartialEq<&str> for FName {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}
impl From<&str> for FName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl From<String> for FName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
impl std::fmt::Display for FName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
impl Serialize for FName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FNameEntry {
    pub name: FString,
    pub non_case_preserving_hash: u16,
    pub case_preserving_hash: u16,
}
impl FNameEntry {
    pub fn new(name: impl Into<FString>) -> Self {
        Self {
            name: name.into(),
            non_case_preserving_hash: 0,
            case_preserving_hash: 0,
        }
    }
    #[instrument(name = "FNameEntry_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            name: ar.read_fstring()?,
            non_case_preserving_hash: ar.read_u16::<LE>()?,
            case_preserving_hash: ar.read_u16::<LE>()?,
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_fstring(&self.name)?;
        ar.write_u16::<LE>(self.non_case_preserving_hash)?;
        ar.write_u16::<LE>(self.case_preserving_hash)?;
        Ok(())
    }
}

/// Signed reference into the import or export table.
///
/// Negative values address import `-i - 1`, positive values export `i - 1`
/// and zero is the null reference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FPackageIndex(pub i32);
impl FPackageIndex {
    pub fn null() -> Self {
        Self(0)
    }
    pub fn from_import(index: usize) -> Self {
        Self(-(index as i32) - 1)
    }
    pub fn from_export(index: usize) -> Self {
        Self(index as i32 + 1)
    }
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
    pub fn is_import(&self) -> bool {
        self.0 < 0
    }
    pub fn is_export(&self) -> bool {
        self.0 > 0
    }
    pub fn import_index(&self) -> Option<usize> {
        self.is_import().then(|| (-self.0 - 1) as usize)
    }
    pub fn export_index(&self) -> Option<usize> {
        self.is_export().then(|| (self.0 - 1) as usize)
    }
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self(ar.read_i32::<LE>()?))
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FObjectImport {
    pub class_package: FName,
    pub class_name: FName,
    pub outer_index: FPackageIndex,
    pub object_name: FName,
}
impl FObjectImport {
    #[instrument(name = "FObjectImport_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            class_package: ar.read_fname()?,
            class_name: ar.read_fname()?,
            outer_index: FPackageIndex::read(ar)?,
            object_name: ar.read_fname()?,
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_fname(&self.class_package)?;
        ar.write_fname(&self.class_name)?;
        self.outer_index.write(ar)?;
        ar.write_fname(&self.object_name)?;
        Ok(())
    }
}

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct ObjectFlags: u32 {
        const PUBLIC = 0x0000_0001;
        const STANDALONE = 0x0000_0002;
        const MARK_AS_NATIVE = 0x0000_0004;
        const TRANSACTIONAL = 0x0000_0008;
        const CLASS_DEFAULT_OBJECT = 0x0000_0010;
        const ARCHETYPE_OBJECT = 0x0000_0020;
        const TRANSIENT = 0x0000_0040;
        const WAS_LOADED = 0x0008_0000;
        const LOAD_COMPLETED = 0x0400_0000;
    }
}

/// Export table entry.
///
/// `serial_offset` is absolute as if the `.uasset` and `.uexp` blobs were
/// concatenated. Both `serial_offset` and `serial_size` are rewritten from
/// the emitted data whenever the package is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FObjectExport {
    pub class_index: FPackageIndex,
    pub super_index: FPackageIndex,
    pub template_index: FPackageIndex,
    pub outer_index: FPackageIndex,
    pub object_name: FName,
    pub object_flags: ObjectFlags,
    pub serial_size: i64,
    pub serial_offset: i64,
    pub forced_export: bool,
    pub not_for_client: bool,
    pub not_for_server: bool,
    pub package_guid: FGuid,
    pub package_flags: u32,
    pub not_always_loaded_for_editor_game: bool,
    pub is_asset: bool,
    pub first_export_dependency: i32,
    pub serialization_before_serialization_dependencies: i32,
    pub create_before_serialization_dependencies: i32,
    pub serialization_before_create_dependencies: i32,
    pub create_before_create_dependencies: i32,
}
impl FObjectExport {
    /// Entry for a new export of the given class, with everything else empty.
    pub fn new(object_name: FName, class_index: FPackageIndex) -> Self {
        Self {
            class_index,
            super_index: FPackageIndex::null(),
            template_index: FPackageIndex::null(),
            outer_index: FPackageIndex::null(),
            object_name,
            object_flags: ObjectFlags::PUBLIC | ObjectFlags::STANDALONE,
            serial_size: 0,
            serial_offset: 0,
            forced_export: false,
            not_for_client: false,
            not_for_server: false,
            package_guid: FGuid::default(),
            package_flags: 0,
            not_always_loaded_for_editor_game: false,
            is_asset: true,
            first_export_dependency: -1,
            serialization_before_serialization_dependencies: 0,
            create_before_serialization_dependencies: 0,
            serialization_before_create_dependencies: 0,
            create_before_create_dependencies: 0,
        }
    }
    #[instrument(name = "FObjectExport_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            class_index: FPackageIndex::read(ar)?,
            super_index: FPackageIndex::read(ar)?,
            template_index: FPackageIndex::read(ar)?,
            outer_index: FPackageIndex::read(ar)?,
            object_name: ar.read_fname()?,
            object_flags: ObjectFlags::from_bits_retain(ar.read_u32::<LE>()?),
            serial_size: ar.read_i64::<LE>()?,
            serial_offset: ar.read_i64::<LE>()?,
            forced_export: ar.read_bool32()?,
            not_for_client: ar.read_bool32()?,
            not_for_server: ar.read_bool32()?,
            package_guid: FGuid::read(ar)?,
            package_flags: ar.read_u32::<LE>()?,
            not_always_loaded_for_editor_game: ar.read_bool32()?,
            is_asset: ar.read_bool32()?,
            first_export_dependency: ar.read_i32::<LE>()?,
            serialization_before_serialization_dependencies: ar.read_i32::<LE>()?,
            create_before_serialization_dependencies: ar.read_i32::<LE>()?,
            serialization_before_create_dependencies: ar.read_i32::<LE>()?,
            create_before_create_dependencies: ar.read_i32::<LE>()?,
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        self.class_index.write(ar)?;
        self.super_index.write(ar)?;
        self.template_index.write(ar)?;
        self.outer_index.write(ar)?;
        ar.write_fname(&self.object_name)?;
        ar.write_u32::<LE>(self.object_flags.bits())?;
        ar.write_i64::<LE>(self.serial_size)?;
        ar.write_i64::<LE>(self.serial_offset)?;
        ar.write_bool32(self.forced_export)?;
        ar.write_bool32(self.not_for_client)?;
        ar.write_bool32(self.not_for_server)?;
        self.package_guid.write(ar)?;
        ar.write_u32::<LE>(self.package_flags)?;
        ar.write_bool32(self.not_always_loaded_for_editor_game)?;
        ar.write_bool32(self.is_asset)?;
        ar.write_i32::<LE>(self.first_export_dependency)?;
        ar.write_i32::<LE>(self.serialization_before_serialization_dependencies)?;
        ar.write_i32::<LE>(self.create_before_serialization_dependencies)?;
        ar.write_i32::<LE>(self.serialization_before_create_dependencies)?;
        ar.write_i32::<LE>(self.create_before_create_dependencies)?;
        Ok(())
    }
}

/// Name, import and export tables of one package.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PackageTables {
    pub names: Vec<FNameEntry>,
    pub imports: Vec<FObjectImport>,
    pub exports: Vec<FObjectExport>,
}
impl PackageTables {
    pub fn name(&self, index: i32) -> Result<FName> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(|entry| FName {
                text: entry.name.as_str().to_string(),
                index: Some(index as u32),
            })
            .ok_or(Error::InvalidNameIndex {
                index,
                len: self.names.len(),
            })
    }
    pub fn find_name(&self, text: &str) -> Option<usize> {
        self.names.iter().position(|entry| entry.name == text)
    }
    /// Name table slot to emit for `name`: the slot it was read from when
    /// that still holds the same text, otherwise the first matching entry.
    pub(crate) fn name_index(&self, name: &FName) -> Result<i32> {
        if let Some(index) = name.index {
            if self
                .names
                .get(index as usize)
                .is_some_and(|entry| entry.name.as_str() == name.text)
            {
                return Ok(index as i32);
            }
        }
        self.find_name(&name.text)
            .map(|i| i as i32)
            .ok_or_else(|| Error::NameNotFound(name.text.clone()))
    }
    pub fn import(&self, index: FPackageIndex) -> Option<&FObjectImport> {
        index.import_index().and_then(|i| self.imports.get(i))
    }
    pub fn export(&self, index: FPackageIndex) -> Option<&FObjectExport> {
        index.export_index().and_then(|i| self.exports.get(i))
    }
    /// Object name of whatever `index` points at.
    pub fn object_name(&self, index: FPackageIndex) -> Option<&FName> {
        if let Some(import) = self.import(index) {
            Some(&import.object_name)
        } else {
            self.export(index).map(|export| &export.object_name)
        }
    }
    /// Class name of the object `index` points at: an import's declared class
    /// or the name of an export's class object.
    pub fn class_name(&self, index: FPackageIndex) -> Option<&FName> {
        if let Some(import) = self.import(index) {
            Some(&import.class_name)
        } else {
            self.export(index)
                .and_then(|export| self.object_name(export.class_index))
        }
    }
}

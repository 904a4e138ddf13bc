use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    read_array, Error, FGuid, FString, Result,
};

/// Leading tag of every package summary, and trailing tag of every `.uexp`.
pub const PACKAGE_MAGIC: u32 = 0x9E2A_83C1;

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct PackageFlags: u32 {
        const NEWLY_CREATED = 0x0000_0001;
        const CLIENT_OPTIONAL = 0x0000_0002;
        const SERVER_SIDE_ONLY = 0x0000_0004;
        const COMPILED_IN = 0x0000_0010;
        const FOR_DIFFING = 0x0000_0020;
        const EDITOR_ONLY = 0x0000_0040;
        const DEVELOPER = 0x0000_0080;
        const UNVERSIONED_PROPERTIES = 0x0000_2000;
        const CONTAINS_MAP_DATA = 0x0000_4000;
        const CONTAINS_MAP = 0x0002_0000;
        const REQUIRES_LOCALIZATION_GATHER = 0x0004_0000;
        const PLAY_IN_EDITOR = 0x0010_0000;
        const CONTAINS_SCRIPT = 0x0020_0000;
        const DISALLOW_EXPORT = 0x0040_0000;
        const RELOADING_FOR_COOKER = 0x4000_0000;
        const FILTER_EDITOR_ONLY = 0x8000_0000;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FCustomVersion {
    pub key: FGuid,
    pub version: i32,
}
impl FCustomVersion {
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            key: FGuid::read(ar)?,
            version: ar.read_i32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        self.key.write(ar)?;
        ar.write_i32::<LE>(self.version)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FGenerationInfo {
    pub export_count: i32,
    pub name_count: i32,
}
impl FGenerationInfo {
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            export_count: ar.read_i32::<LE>()?,
            name_count: ar.read_i32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.export_count)?;
        ar.write_i32::<LE>(self.name_count)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FEngineVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub changelist: u32,
    pub branch: FString,
}
impl FEngineVersion {
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            major: ar.read_u16::<LE>()?,
            minor: ar.read_u16::<LE>()?,
            patch: ar.read_u16::<LE>()?,
            changelist: ar.read_u32::<LE>()?,
            branch: ar.read_fstring()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u16::<LE>(self.major)?;
        ar.write_u16::<LE>(self.minor)?;
        ar.write_u16::<LE>(self.patch)?;
        ar.write_u32::<LE>(self.changelist)?;
        ar.write_fstring(&self.branch)?;
        Ok(())
    }
}
impl std::fmt::Display for FEngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}+{}",
            self.major, self.minor, self.patch, self.changelist, self.branch
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FCompressedChunk {
    pub uncompressed_offset: i32,
    pub uncompressed_size: i32,
    pub compressed_offset: i32,
    pub compressed_size: i32,
}
impl FCompressedChunk {
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            uncompressed_offset: ar.read_i32::<LE>()?,
            uncompressed_size: ar.read_i32::<LE>()?,
            compressed_offset: ar.read_i32::<LE>()?,
            compressed_size: ar.read_i32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.uncompressed_offset)?;
        ar.write_i32::<LE>(self.uncompressed_size)?;
        ar.write_i32::<LE>(self.compressed_offset)?;
        ar.write_i32::<LE>(self.compressed_size)?;
        Ok(())
    }
}

/// Package file summary at the start of the `.uasset` blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FPackageFileSummary {
    pub tag: u32,
    pub legacy_file_version: i32,
    pub legacy_ue3_version: i32,
    pub file_version_ue4: i32,
    pub file_version_licensee_ue4: i32,
    pub custom_versions: Vec<FCustomVersion>,
    pub total_header_size: i32,
    pub folder_name: FString,
    pub package_flags: PackageFlags,
    pub name_count: i32,
    pub name_offset: i32,
    pub gatherable_text_data_count: i32,
    pub gatherable_text_data_offset: i32,
    pub export_count: i32,
    pub export_offset: i32,
    pub import_count: i32,
    pub import_offset: i32,
    pub depends_offset: i32,
    pub soft_package_references_count: i32,
    pub soft_package_references_offset: i32,
    pub searchable_names_offset: i32,
    pub thumbnail_table_offset: i32,
    pub guid: FGuid,
    pub generations: Vec<FGenerationInfo>,
    pub saved_by_engine_version: FEngineVersion,
    pub compatible_with_engine_version: FEngineVersion,
    pub compression_flags: u32,
    pub compressed_chunks: Vec<FCompressedChunk>,
    pub package_source: u32,
    pub additional_packages_to_cook: Vec<FString>,
    pub asset_registry_data_offset: i32,
    pub bulk_data_start_offset: i64,
    pub world_tile_info_data_offset: i32,
    pub chunk_ids: Vec<i32>,
    pub preload_dependency_count: i32,
    pub preload_dependency_offset: i32,
}

impl Default for FPackageFileSummary {
    fn default() -> Self {
        Self {
            tag: PACKAGE_MAGIC,
            legacy_file_version: -7,
            legacy_ue3_version: 864,
            file_version_ue4: 0,
            file_version_licensee_ue4: 0,
            custom_versions: vec![],
            total_header_size: 0,
            folder_name: FString::new("None"),
            package_flags: PackageFlags::FILTER_EDITOR_ONLY,
            name_count: 0,
            name_offset: 0,
            gatherable_text_data_count: 0,
            gatherable_text_data_offset: 0,
            export_count: 0,
            export_offset: 0,
            import_count: 0,
            import_offset: 0,
            depends_offset: 0,
            soft_package_references_count: 0,
            soft_package_references_offset: 0,
            searchable_names_offset: 0,
            thumbnail_table_offset: 0,
            guid: FGuid::default(),
            generations: vec![],
            saved_by_engine_version: FEngineVersion::default(),
            compatible_with_engine_version: FEngineVersion::default(),
            compression_flags: 0,
            compressed_chunks: vec![],
            package_source: 0,
            additional_packages_to_cook: vec![],
            asset_registry_data_offset: 0,
            bulk_data_start_offset: 0,
            world_tile_info_data_offset: 0,
            chunk_ids: vec![],
            preload_dependency_count: 0,
            preload_dependency_offset: 0,
        }
    }
}

impl FPackageFileSummary {
    #[instrument(name = "FPackageFileSummary_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        let tag = ar.read_u32::<LE>()?;
        if tag != PACKAGE_MAGIC {
            return Err(Error::InvalidMagic {
                expected: PACKAGE_MAGIC,
                found: tag,
            });
        }
        let summary = Self {
            tag,
            legacy_file_version: ar.read_i32::<LE>()?,
            legacy_ue3_version: ar.read_i32::<LE>()?,
            file_version_ue4: ar.read_i32::<LE>()?,
            file_version_licensee_ue4: ar.read_i32::<LE>()?,
            custom_versions: read_array(ar.read_u32::<LE>()?, ar, FCustomVersion::read)?,
            total_header_size: ar.read_i32::<LE>()?,
            folder_name: ar.read_fstring()?,
            package_flags: PackageFlags::from_bits_retain(ar.read_u32::<LE>()?),
            name_count: ar.read_i32::<LE>()?,
            name_offset: ar.read_i32::<LE>()?,
            gatherable_text_data_count: ar.read_i32::<LE>()?,
            gatherable_text_data_offset: ar.read_i32::<LE>()?,
            export_count: ar.read_i32::<LE>()?,
            export_offset: ar.read_i32::<LE>()?,
            import_count: ar.read_i32::<LE>()?,
            import_offset: ar.read_i32::<LE>()?,
            depends_offset: ar.read_i32::<LE>()?,
            soft_package_references_count: ar.read_i32::<LE>()?,
            soft_package_references_offset: ar.read_i32::<LE>()?,
            searchable_names_offset: ar.read_i32::<LE>()?,
            thumbnail_table_offset: ar.read_i32::<LE>()?,
            guid: FGuid::read(ar)?,
            generations: read_array(ar.read_u32::<LE>()?, ar, FGenerationInfo::read)?,
            saved_by_engine_version: FEngineVersion::read(ar)?,
            compatible_with_engine_version: FEngineVersion::read(ar)?,
            compression_flags: ar.read_u32::<LE>()?,
            compressed_chunks: read_array(ar.read_u32::<LE>()?, ar, FCompressedChunk::read)?,
            package_source: ar.read_u32::<LE>()?,
            additional_packages_to_cook: read_array(ar.read_u32::<LE>()?, ar, |ar| {
                ar.read_fstring()
            })?,
            asset_registry_data_offset: ar.read_i32::<LE>()?,
            bulk_data_start_offset: ar.read_i64::<LE>()?,
            world_tile_info_data_offset: ar.read_i32::<LE>()?,
            chunk_ids: read_array(ar.read_u32::<LE>()?, ar, |ar| Ok(ar.read_i32::<LE>()?))?,
            preload_dependency_count: ar.read_i32::<LE>()?,
            preload_dependency_offset: ar.read_i32::<LE>()?,
        };
        if summary
            .package_flags
            .contains(PackageFlags::UNVERSIONED_PROPERTIES)
        {
            return Err(Error::format(
                "packages with unversioned properties are not supported",
            ));
        }
        for (what, count) in [
            ("name", summary.name_count),
            ("import", summary.import_count),
            ("export", summary.export_count),
        ] {
            if count < 0 {
                return Err(Error::format(format!("negative {what} count {count}")));
            }
        }
        Ok(summary)
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u32::<LE>(self.tag)?;
        ar.write_i32::<LE>(self.legacy_file_version)?;
        ar.write_i32::<LE>(self.legacy_ue3_version)?;
        ar.write_i32::<LE>(self.file_version_ue4)?;
        ar.write_i32::<LE>(self.file_version_licensee_ue4)?;
        ar.write_u32::<LE>(self.custom_versions.len() as u32)?;
        for version in &self.custom_versions {
            version.write(ar)?;
        }
        ar.write_i32::<LE>(self.total_header_size)?;
        ar.write_fstring(&self.folder_name)?;
        ar.write_u32::<LE>(self.package_flags.bits())?;
        ar.write_i32::<LE>(self.name_count)?;
        ar.write_i32::<LE>(self.name_offset)?;
        ar.write_i32::<LE>(self.gatherable_text_data_count)?;
        ar.write_i32::<LE>(self.gatherable_text_data_offset)?;
        ar.write_i32::<LE>(self.export_count)?;
        ar.write_i32::<LE>(self.export_offset)?;
        ar.write_i32::<LE>(self.import_count)?;
        ar.write_i32::<LE>(self.import_offset)?;
        ar.write_i32::<LE>(self.depends_offset)?;
        ar.write_i32::<LE>(self.soft_package_references_count)?;
        ar.write_i32::<LE>(self.soft_package_references_offset)?;
        ar.write_i32::<LE>(self.searchable_names_offset)?;
        ar.write_i32::<LE>(self.thumbnail_table_offset)?;
        self.guid.write(ar)?;
        ar.write_u32::<LE>(self.generations.len() as u32)?;
        for generation in &self.generations {
            generation.write(ar)?;
        }
        self.saved_by_engine_version.write(ar)?;
        self.compatible_with_engine_version.write(ar)?;
        ar.write_u32::<LE>(self.compression_flags)?;
        ar.write_u32::<LE>(self.compressed_chunks.len() as u32)?;
        for chunk in &self.compressed_chunks {
            chunk.write(ar)?;
        }
        ar.write_u32::<LE>(self.package_source)?;
        ar.write_u32::<LE>(self.additional_packages_to_cook.len() as u32)?;
        for package in &self.additional_packages_to_cook {
            ar.write_fstring(package)?;
        }
        ar.write_i32::<LE>(self.asset_registry_data_offset)?;
        ar.write_i64::<LE>(self.bulk_data_start_offset)?;
        ar.write_i32::<LE>(self.world_tile_info_data_offset)?;
        ar.write_u32::<LE>(self.chunk_ids.len() as u32)?;
        for id in &self.chunk_ids {
            ar.write_i32::<LE>(*id)?;
        }
        ar.write_i32::<LE>(self.preload_dependency_count)?;
        ar.write_i32::<LE>(self.preload_dependency_offset)?;
        Ok(())
    }
}

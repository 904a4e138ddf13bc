use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    tables::FName,
    FGuid, Result,
};

use super::{ByteValue, FPropertyTagType, PropertyType};

/// Kind specific header fields stored between a tag's array index and its
/// GUID flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FPropertyTagData {
    Struct { struct_type: FName, guid: FGuid },
    /// The value of a bool property lives here; its value payload is empty.
    Bool(bool),
    Enum(FName),
    Byte(FName),
    Array(FName),
    Set(FName),
    Map { key_type: FName, value_type: FName },
}

impl FPropertyTagData {
    /// Reads the tag data for `kind`. Kinds without tag data consume nothing.
    #[instrument(name = "FPropertyTagData_read", skip_all)]
    pub fn read<A: ArchiveReader>(ar: &mut A, kind: &str) -> Result<Option<Self>> {
        let Some(property_type) = PropertyType::from_name(kind) else {
            return Ok(None);
        };
        Ok(Some(match property_type {
            PropertyType::StructProperty => Self::Struct {
                struct_type: ar.read_fname()?,
                guid: FGuid::read(ar)?,
            },
            PropertyType::BoolProperty => Self::Bool(ar.read_flag()?),
            PropertyType::EnumProperty => Self::Enum(ar.read_fname()?),
            PropertyType::ByteProperty => Self::Byte(ar.read_fname()?),
            PropertyType::ArrayProperty => Self::Array(ar.read_fname()?),
            PropertyType::SetProperty => Self::Set(ar.read_fname()?),
            PropertyType::MapProperty => Self::Map {
                key_type: ar.read_fname()?,
                value_type: ar.read_fname()?,
            },
            _ => return Ok(None),
        }))
    }
    pub fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        match self {
            Self::Struct { struct_type, guid } => {
                ar.write_fname(struct_type)?;
                guid.write(ar)?;
            }
            Self::Bool(value) => ar.write_flag(*value)?,
            Self::Enum(name) | Self::Byte(name) | Self::Array(name) | Self::Set(name) => {
                ar.write_fname(name)?
            }
            Self::Map {
                key_type,
                value_type,
            } => {
                ar.write_fname(key_type)?;
                ar.write_fname(value_type)?;
            }
        }
        Ok(())
    }
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Struct { .. } => PropertyType::StructProperty,
            Self::Bool(_) => PropertyType::BoolProperty,
            Self::Enum(_) => PropertyType::EnumProperty,
            Self::Byte(_) => PropertyType::ByteProperty,
            Self::Array(_) => PropertyType::ArrayProperty,
            Self::Set(_) => PropertyType::SetProperty,
            Self::Map { .. } => PropertyType::MapProperty,
        }
    }
    /// Tag data describing a value built in memory.
    ///
    /// Enum types are taken from the `Type::Value` prefix of the label, plain
    /// bytes and the enum sentinel get `None`.
    pub fn for_value(value: &FPropertyTagType) -> Option<Self> {
        fn enum_type(label: &FName) -> FName {
            label
                .as_str()
                .split_once("::")
                .map(|(enum_type, _)| FName::new(enum_type))
                .unwrap_or_else(FName::none)
        }
        Some(match value {
            FPropertyTagType::Bool(value) => Self::Bool(*value),
            FPropertyTagType::Struct(value) => Self::Struct {
                struct_type: FName::new(value.struct_type.as_str()),
                guid: FGuid::default(),
            },
            FPropertyTagType::Byte(ByteValue::Byte(_) | ByteValue::Wide(_)) => {
                Self::Byte(FName::none())
            }
            FPropertyTagType::Byte(ByteValue::Label(label)) => Self::Byte(enum_type(label)),
            FPropertyTagType::Enum(None) => Self::Enum(FName::none()),
            FPropertyTagType::Enum(Some(label)) => Self::Enum(enum_type(label)),
            FPropertyTagType::Array(value) => Self::Array(value.inner_type.clone()),
            FPropertyTagType::Set(value) => Self::Set(value.element_type.clone()),
            FPropertyTagType::Map(value) => Self::Map {
                key_type: value.key_type.clone(),
                value_type: value.value_type.clone(),
            },
            _ => return None,
        })
    }
}

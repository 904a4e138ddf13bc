use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    context::DiagnosticKind,
    tables::{FName, FPackageIndex},
    Error, FString, Result,
};

use super::{
    FPropertyTagData, FSoftObjectPath, FText, ScriptArray, ScriptMap, ScriptSet, ScriptStruct,
    StructType,
};

/// Where a value is being encoded. Some kinds change their encoding when
/// they appear as array elements or as map keys/values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueContext {
    Normal,
    ArrayElement,
    MapElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyType {
    BoolProperty,
    StructProperty,
    ObjectProperty,
    InterfaceProperty,
    FloatProperty,
    DoubleProperty,
    TextProperty,
    StrProperty,
    NameProperty,
    IntProperty,
    Int8Property,
    Int16Property,
    Int64Property,
    UInt16Property,
    UInt32Property,
    UInt64Property,
    ArrayProperty,
    SetProperty,
    MapProperty,
    ByteProperty,
    EnumProperty,
    SoftObjectProperty,
    DelegateProperty,
    MulticastDelegateProperty,
    LazyObjectProperty,
}
impl PropertyType {
    pub fn get_name(&self) -> &'static str {
        match self {
            PropertyType::BoolProperty => "BoolProperty",
            PropertyType::StructProperty => "StructProperty",
            PropertyType::ObjectProperty => "ObjectProperty",
            PropertyType::InterfaceProperty => "InterfaceProperty",
            PropertyType::FloatProperty => "FloatProperty",
            PropertyType::DoubleProperty => "DoubleProperty",
            PropertyType::TextProperty => "TextProperty",
            PropertyType::StrProperty => "StrProperty",
            PropertyType::NameProperty => "NameProperty",
            PropertyType::IntProperty => "IntProperty",
            PropertyType::Int8Property => "Int8Property",
            PropertyType::Int16Property => "Int16Property",
            PropertyType::Int64Property => "Int64Property",
            PropertyType::UInt16Property => "UInt16Property",
            PropertyType::UInt32Property => "UInt32Property",
            PropertyType::UInt64Property => "UInt64Property",
            PropertyType::ArrayProperty => "ArrayProperty",
            PropertyType::SetProperty => "SetProperty",
            PropertyType::MapProperty => "MapProperty",
            PropertyType::ByteProperty => "ByteProperty",
            PropertyType::EnumProperty => "EnumProperty",
            PropertyType::SoftObjectProperty => "SoftObjectProperty",
            PropertyType::DelegateProperty => "DelegateProperty",
            PropertyType::MulticastDelegateProperty => "MulticastDelegateProperty",
            PropertyType::LazyObjectProperty => "LazyObjectProperty",
        }
    }
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "BoolProperty" => PropertyType::BoolProperty,
            "StructProperty" => PropertyType::StructProperty,
            "ObjectProperty" => PropertyType::ObjectProperty,
            "InterfaceProperty" => PropertyType::InterfaceProperty,
            "FloatProperty" => PropertyType::FloatProperty,
            "DoubleProperty" => PropertyType::DoubleProperty,
            "TextProperty" => PropertyType::TextProperty,
            "StrProperty" => PropertyType::StrProperty,
            "NameProperty" => PropertyType::NameProperty,
            "IntProperty" => PropertyType::IntProperty,
            "Int8Property" => PropertyType::Int8Property,
            "Int16Property" => PropertyType::Int16Property,
            "Int64Property" => PropertyType::Int64Property,
            "UInt16Property" => PropertyType::UInt16Property,
            "UInt32Property" => PropertyType::UInt32Property,
            "UInt64Property" => PropertyType::UInt64Property,
            "ArrayProperty" => PropertyType::ArrayProperty,
            "SetProperty" => PropertyType::SetProperty,
            "MapProperty" => PropertyType::MapProperty,
            "ByteProperty" => PropertyType::ByteProperty,
            "EnumProperty" => PropertyType::EnumProperty,
            "SoftObjectProperty" => PropertyType::SoftObjectProperty,
            "DelegateProperty" => PropertyType::DelegateProperty,
            "MulticastDelegateProperty" => PropertyType::MulticastDelegateProperty,
            "LazyObjectProperty" => PropertyType::LazyObjectProperty,
            _ => return None,
        })
    }
    /// Array elements of these kinds are preceded by a full inner tag.
    pub(crate) fn has_inner_tag(&self) -> bool {
        matches!(
            self,
            PropertyType::StructProperty | PropertyType::ArrayProperty
        )
    }
}
impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.get_name())
    }
}

/// Just a plain byte, or an enum in which case the variant is a name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ByteValue {
    Byte(u8),
    Label(FName),
    /// Map key or value stored as a 32 bit word that does not fit a byte
    Wide(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FScriptDelegate {
    pub object: FPackageIndex,
    pub function_name: FName,
}
impl FScriptDelegate {
    #[instrument(name = "FScriptDelegate_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            object: FPackageIndex::read(ar)?,
            function_name: ar.read_fname()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        self.object.write(ar)?;
        ar.write_fname(&self.function_name)?;
        Ok(())
    }
}

/// Decoded value of a property tag, one variant per property kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FPropertyTagType {
    Bool(bool),
    Struct(ScriptStruct),
    Object(FPackageIndex),
    Interface(u32),
    Float(f32),
    Double(f64),
    Text(FText),
    Str(FString),
    Name(FName),
    Int(i32),
    Int8(i8),
    Int16(i16),
    Int64(i64),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Array(ScriptArray),
    Set(ScriptSet),
    Map(ScriptMap),
    Byte(ByteValue),
    /// `None` when the tag declares no enum type and the value is empty
    Enum(Option<FName>),
    SoftObject(FSoftObjectPath),
    Delegate(FScriptDelegate),
}

impl FPropertyTagType {
    /// Reads a value of kind `kind`.
    ///
    /// Returns `Ok(None)` for a kind name that is not recognized, or for a
    /// container whose elements are of such a kind; the caller is expected to
    /// skip the value using its declared size.
    #[instrument(name = "FPropertyTagType_read", skip(ar, tag_data))]
    pub fn read<A: ArchiveReader>(
        ar: &mut A,
        kind: &str,
        tag_data: Option<&FPropertyTagData>,
        context: ValueContext,
    ) -> Result<Option<Self>> {
        let Some(property_type) = PropertyType::from_name(kind) else {
            ar.report(
                DiagnosticKind::UnknownPropertyKind,
                format!("unknown property kind {kind:?}"),
            )?;
            return Ok(None);
        };
        Self::read_typed(ar, property_type, tag_data, context)
    }

    fn read_typed<A: ArchiveReader>(
        ar: &mut A,
        property_type: PropertyType,
        tag_data: Option<&FPropertyTagData>,
        context: ValueContext,
    ) -> Result<Option<Self>> {
        Ok(Some(match property_type {
            PropertyType::BoolProperty => match (context, tag_data) {
                (ValueContext::Normal, Some(FPropertyTagData::Bool(value))) => Self::Bool(*value),
                (ValueContext::Normal, _) => {
                    return Err(Error::format("BoolProperty without a tag data flag"))
                }
                _ => Self::Bool(ar.read_flag()?),
            },
            PropertyType::StructProperty => {
                let struct_type = match tag_data {
                    Some(FPropertyTagData::Struct { struct_type, .. }) => {
                        StructType::from(struct_type.as_str())
                    }
                    _ => ar.struct_type_or(&StructType::Struct(None))?,
                };
                Self::Struct(ScriptStruct::read(ar, struct_type)?)
            }
            PropertyType::ObjectProperty => Self::Object(FPackageIndex::read(ar)?),
            PropertyType::InterfaceProperty => Self::Interface(ar.read_u32::<LE>()?),
            PropertyType::FloatProperty => Self::Float(ar.read_f32::<LE>()?),
            PropertyType::DoubleProperty => Self::Double(ar.read_f64::<LE>()?),
            PropertyType::TextProperty => Self::Text(FText::read(ar)?),
            PropertyType::StrProperty => Self::Str(ar.read_fstring()?),
            PropertyType::NameProperty => Self::Name(ar.read_fname()?),
            PropertyType::IntProperty => Self::Int(ar.read_i32::<LE>()?),
            PropertyType::Int8Property => Self::Int8(ar.read_i8()?),
            PropertyType::Int16Property => Self::Int16(ar.read_i16::<LE>()?),
            PropertyType::Int64Property => Self::Int64(ar.read_i64::<LE>()?),
            PropertyType::UInt16Property => Self::UInt16(ar.read_u16::<LE>()?),
            PropertyType::UInt32Property => Self::UInt32(ar.read_u32::<LE>()?),
            PropertyType::UInt64Property => Self::UInt64(ar.read_u64::<LE>()?),
            PropertyType::ArrayProperty => match ScriptArray::read(ar, tag_data)? {
                Some(array) => Self::Array(array),
                None => return Ok(None),
            },
            PropertyType::SetProperty => match ScriptSet::read(ar, tag_data)? {
                Some(set) => Self::Set(set),
                None => return Ok(None),
            },
            PropertyType::MapProperty => match ScriptMap::read(ar, tag_data)? {
                Some(map) => Self::Map(map),
                None => return Ok(None),
            },
            PropertyType::ByteProperty => Self::Byte(match context {
                ValueContext::Normal => match tag_data {
                    Some(FPropertyTagData::Byte(enum_type)) if !enum_type.is_none() => {
                        ByteValue::Label(ar.read_fname()?)
                    }
                    _ => ByteValue::Byte(ar.read_u8()?),
                },
                ValueContext::ArrayElement => ByteValue::Byte(ar.read_u8()?),
                ValueContext::MapElement => {
                    let word = ar.read_u32::<LE>()?;
                    u8::try_from(word).map_or(ByteValue::Wide(word), ByteValue::Byte)
                }
            }),
            PropertyType::EnumProperty => match (context, tag_data) {
                (ValueContext::Normal, Some(FPropertyTagData::Enum(enum_type)))
                    if enum_type.is_none() =>
                {
                    Self::Enum(None)
                }
                _ => Self::Enum(Some(ar.read_fname()?)),
            },
            PropertyType::SoftObjectProperty => {
                let path = FSoftObjectPath::read(ar)?;
                if context == ValueContext::MapElement {
                    ar.skip(4)?;
                }
                Self::SoftObject(path)
            }
            PropertyType::DelegateProperty => Self::Delegate(FScriptDelegate::read(ar)?),
            PropertyType::MulticastDelegateProperty | PropertyType::LazyObjectProperty => {
                return Err(Error::UnsupportedPropertyKind(
                    property_type.get_name().to_string(),
                ))
            }
        }))
    }

    pub fn write<A: ArchiveWriter>(&self, ar: &mut A, context: ValueContext) -> Result<()> {
        match self {
            Self::Bool(value) => {
                if context != ValueContext::Normal {
                    ar.write_flag(*value)?;
                }
            }
            Self::Struct(value) => value.write(ar)?,
            Self::Object(value) => value.write(ar)?,
            Self::Interface(value) => ar.write_u32::<LE>(*value)?,
            Self::Float(value) => ar.write_f32::<LE>(*value)?,
            Self::Double(value) => ar.write_f64::<LE>(*value)?,
            Self::Text(value) => value.write(ar)?,
            Self::Str(value) => ar.write_fstring(value)?,
            Self::Name(value) => ar.write_fname(value)?,
            Self::Int(value) => ar.write_i32::<LE>(*value)?,
            Self::Int8(value) => ar.write_i8(*value)?,
            Self::Int16(value) => ar.write_i16::<LE>(*value)?,
            Self::Int64(value) => ar.write_i64::<LE>(*value)?,
            Self::UInt16(value) => ar.write_u16::<LE>(*value)?,
            Self::UInt32(value) => ar.write_u32::<LE>(*value)?,
            Self::UInt64(value) => ar.write_u64::<LE>(*value)?,
            Self::Array(value) => value.write(ar)?,
            Self::Set(value) => value.write(ar)?,
            Self::Map(value) => value.write(ar)?,
            Self::Byte(value) => match (value, context) {
                (ByteValue::Byte(byte), ValueContext::MapElement) => {
                    ar.write_u32::<LE>(*byte as u32)?
                }
                (ByteValue::Byte(byte), _) => ar.write_u8(*byte)?,
                (ByteValue::Wide(word), ValueContext::MapElement) => ar.write_u32::<LE>(*word)?,
                (ByteValue::Wide(word), _) => {
                    let byte = u8::try_from(*word)
                        .map_err(|_| Error::type_mismatch("byte", word.to_string()))?;
                    ar.write_u8(byte)?
                }
                (ByteValue::Label(label), ValueContext::Normal) => ar.write_fname(label)?,
                (ByteValue::Label(label), _) => {
                    return Err(Error::type_mismatch(
                        "raw byte for a container element",
                        format!("enum label {label}"),
                    ))
                }
            },
            Self::Enum(None) => {
                if context != ValueContext::Normal {
                    return Err(Error::type_mismatch(
                        "enum name for a container element",
                        "empty enum",
                    ));
                }
            }
            Self::Enum(Some(name)) => ar.write_fname(name)?,
            Self::SoftObject(path) => {
                path.write(ar)?;
                if context == ValueContext::MapElement {
                    ar.write_u32::<LE>(0)?;
                }
            }
            Self::Delegate(value) => value.write(ar)?,
        }
        Ok(())
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Bool(_) => PropertyType::BoolProperty,
            Self::Struct(_) => PropertyType::StructProperty,
            Self::Object(_) => PropertyType::ObjectProperty,
            Self::Interface(_) => PropertyType::InterfaceProperty,
            Self::Float(_) => PropertyType::FloatProperty,
            Self::Double(_) => PropertyType::DoubleProperty,
            Self::Text(_) => PropertyType::TextProperty,
            Self::Str(_) => PropertyType::StrProperty,
            Self::Name(_) => PropertyType::NameProperty,
            Self::Int(_) => PropertyType::IntProperty,
            Self::Int8(_) => PropertyType::Int8Property,
            Self::Int16(_) => PropertyType::Int16Property,
            Self::Int64(_) => PropertyType::Int64Property,
            Self::UInt16(_) => PropertyType::UInt16Property,
            Self::UInt32(_) => PropertyType::UInt32Property,
            Self::UInt64(_) => PropertyType::UInt64Property,
            Self::Array(_) => PropertyType::ArrayProperty,
            Self::Set(_) => PropertyType::SetProperty,
            Self::Map(_) => PropertyType::MapProperty,
            Self::Byte(_) => PropertyType::ByteProperty,
            Self::Enum(_) => PropertyType::EnumProperty,
            Self::SoftObject(_) => PropertyType::SoftObjectProperty,
            Self::Delegate(_) => PropertyType::DelegateProperty,
        }
    }

    /// Fails with [`Error::TypeMismatch`] unless this value is of kind `expected`.
    pub fn check_type(&self, expected: &str) -> Result<()> {
        let found = self.property_type().get_name();
        if found == expected {
            Ok(())
        } else {
            Err(Error::type_mismatch(expected, found))
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_name(&self) -> Option<&FName> {
        match self {
            Self::Name(name) | Self::Enum(Some(name)) | Self::Byte(ByteValue::Label(name)) => {
                Some(name)
            }
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<FPackageIndex> {
        match self {
            Self::Object(index) => Some(*index),
            _ => None,
        }
    }
    pub fn as_text(&self) -> Option<&FText> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
    pub fn as_text_mut(&mut self) -> Option<&mut FText> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
    pub fn as_struct(&self) -> Option<&ScriptStruct> {
        match self {
            Self::Struct(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&ScriptArray> {
        match self {
            Self::Array(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&ScriptMap> {
        match self {
            Self::Map(value) => Some(value),
            _ => None,
        }
    }
}

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    read_array,
    tables::FName,
    Error, FGuid, FString, Result,
};

use super::{read_properties_until_none, write_properties_none_terminated, Properties};

/// Struct types with a native binary layout. Anything else is
/// [`StructType::Struct`], a nested property list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StructType {
    Guid,
    DateTime,
    Timespan,
    Vector2D,
    Vector,
    IntVector,
    Box,
    IntPoint,
    Quat,
    Rotator,
    LinearColor,
    Color,
    SoftObjectPath,
    GameplayTagContainer,
    Struct(Option<String>),
}
impl From<&str> for StructType {
    fn from(t: &str) -> Self {
        match t {
            "Guid" => StructType::Guid,
            "DateTime" => StructType::DateTime,
            "Timespan" => StructType::Timespan,
            "Vector2D" => StructType::Vector2D,
            "Vector" => StructType::Vector,
            "IntVector" => StructType::IntVector,
            "Box" => StructType::Box,
            "IntPoint" => StructType::IntPoint,
            "Quat" => StructType::Quat,
            "Rotator" => StructType::Rotator,
            "LinearColor" => StructType::LinearColor,
            "Color" => StructType::Color,
            "SoftObjectPath" => StructType::SoftObjectPath,
            "GameplayTagContainer" => StructType::GameplayTagContainer,
            "Struct" => StructType::Struct(None),
            _ => StructType::Struct(Some(t.to_owned())),
        }
    }
}
impl From<String> for StructType {
    fn from(t: String) -> Self {
        t.as_str().into()
    }
}
impl StructType {
    pub fn as_str(&self) -> &str {
        match self {
            StructType::Guid => "Guid",
            StructType::DateTime => "DateTime",
            StructType::Timespan => "Timespan",
            StructType::Vector2D => "Vector2D",
            StructType::Vector => "Vector",
            StructType::IntVector => "IntVector",
            StructType::Box => "Box",
            StructType::IntPoint => "IntPoint",
            StructType::Quat => "Quat",
            StructType::Rotator => "Rotator",
            StructType::LinearColor => "LinearColor",
            StructType::Color => "Color",
            StructType::SoftObjectPath => "SoftObjectPath",
            StructType::GameplayTagContainer => "GameplayTagContainer",
            StructType::Struct(Some(t)) => t,
            StructType::Struct(None) => "Struct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}
impl Vector2D {
    #[instrument(name = "Vector2D_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            x: ar.read_f32::<LE>()?,
            y: ar.read_f32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_f32::<LE>(self.x)?;
        ar.write_f32::<LE>(self.y)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
impl Vector {
    #[instrument(name = "Vector_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            x: ar.read_f32::<LE>()?,
            y: ar.read_f32::<LE>()?,
            z: ar.read_f32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_f32::<LE>(self.x)?;
        ar.write_f32::<LE>(self.y)?;
        ar.write_f32::<LE>(self.z)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}
impl Rotator {
    #[instrument(name = "Rotator_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            pitch: ar.read_f32::<LE>()?,
            yaw: ar.read_f32::<LE>()?,
            roll: ar.read_f32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_f32::<LE>(self.pitch)?;
        ar.write_f32::<LE>(self.yaw)?;
        ar.write_f32::<LE>(self.roll)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}
impl Quat {
    #[instrument(name = "Quat_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            x: ar.read_f32::<LE>()?,
            y: ar.read_f32::<LE>()?,
            z: ar.read_f32::<LE>()?,
            w: ar.read_f32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_f32::<LE>(self.x)?;
        ar.write_f32::<LE>(self.y)?;
        ar.write_f32::<LE>(self.z)?;
        ar.write_f32::<LE>(self.w)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntVector {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
impl IntVector {
    #[instrument(name = "IntVector_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            x: ar.read_i32::<LE>()?,
            y: ar.read_i32::<LE>()?,
            z: ar.read_i32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.x)?;
        ar.write_i32::<LE>(self.y)?;
        ar.write_i32::<LE>(self.z)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}
impl IntPoint {
    #[instrument(name = "IntPoint_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            x: ar.read_i32::<LE>()?,
            y: ar.read_i32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.x)?;
        ar.write_i32::<LE>(self.y)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Box {
    pub min: Vector,
    pub max: Vector,
    /// Kept as the raw byte so the value is written back unchanged
    pub is_valid: u8,
}
impl Box {
    #[instrument(name = "Box_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            min: Vector::read(ar)?,
            max: Vector::read(ar)?,
            is_valid: ar.read_u8()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        self.min.write(ar)?;
        self.max.write(ar)?;
        ar.write_u8(self.is_valid)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}
impl LinearColor {
    #[instrument(name = "LinearColor_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            r: ar.read_f32::<LE>()?,
            g: ar.read_f32::<LE>()?,
            b: ar.read_f32::<LE>()?,
            a: ar.read_f32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_f32::<LE>(self.r)?;
        ar.write_f32::<LE>(self.g)?;
        ar.write_f32::<LE>(self.b)?;
        ar.write_f32::<LE>(self.a)?;
        Ok(())
    }
}

/// 8 bit color stored in BGRA order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}
impl Color {
    #[instrument(name = "Color_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            b: ar.read_u8()?,
            g: ar.read_u8()?,
            r: ar.read_u8()?,
            a: ar.read_u8()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u8(self.b)?;
        ar.write_u8(self.g)?;
        ar.write_u8(self.r)?;
        ar.write_u8(self.a)?;
        Ok(())
    }
}

/// Path to an asset plus an optional sub-object path within it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FSoftObjectPath {
    pub asset_path_name: FName,
    pub sub_path_string: FString,
}
impl FSoftObjectPath {
    pub fn new(asset_path_name: impl Into<FName>, sub_path_string: impl Into<FString>) -> Self {
        Self {
            asset_path_name: asset_path_name.into(),
            sub_path_string: sub_path_string.into(),
        }
    }
    #[instrument(name = "FSoftObjectPath_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        Ok(Self {
            asset_path_name: ar.read_fname()?,
            sub_path_string: ar.read_fstring()?,
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_fname(&self.asset_path_name)?;
        ar.write_fstring(&self.sub_path_string)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameplayTagContainer {
    pub gameplay_tags: Vec<FName>,
}
impl GameplayTagContainer {
    #[instrument(name = "GameplayTagContainer_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        let count = ar.read_u32::<LE>()?;
        Ok(Self {
            gameplay_tags: read_array(count, ar, |ar| ar.read_fname())?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u32::<LE>(self.gameplay_tags.len() as u32)?;
        for tag in &self.gameplay_tags {
            ar.write_fname(tag)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StructValue {
    Guid(FGuid),
    DateTime(u64),
    Timespan(i64),
    Vector2D(Vector2D),
    Vector(Vector),
    IntVector(IntVector),
    IntPoint(IntPoint),
    Box(Box),
    Quat(Quat),
    Rotator(Rotator),
    LinearColor(LinearColor),
    Color(Color),
    SoftObjectPath(FSoftObjectPath),
    GameplayTagContainer(GameplayTagContainer),
    /// User defined struct which is simply a list of properties
    Struct(Properties),
}
impl StructValue {
    #[instrument(name = "StructValue_read", skip(ar))]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A, t: &StructType) -> Result<StructValue> {
        Ok(match t {
            StructType::Guid => StructValue::Guid(FGuid::read(ar)?),
            StructType::DateTime => StructValue::DateTime(ar.read_u64::<LE>()?),
            StructType::Timespan => StructValue::Timespan(ar.read_i64::<LE>()?),
            StructType::Vector2D => StructValue::Vector2D(Vector2D::read(ar)?),
            StructType::Vector => StructValue::Vector(Vector::read(ar)?),
            StructType::IntVector => StructValue::IntVector(IntVector::read(ar)?),
            StructType::IntPoint => StructValue::IntPoint(IntPoint::read(ar)?),
            StructType::Box => StructValue::Box(Box::read(ar)?),
            StructType::Quat => StructValue::Quat(Quat::read(ar)?),
            StructType::Rotator => StructValue::Rotator(Rotator::read(ar)?),
            StructType::LinearColor => StructValue::LinearColor(LinearColor::read(ar)?),
            StructType::Color => StructValue::Color(Color::read(ar)?),
            StructType::SoftObjectPath => StructValue::SoftObjectPath(FSoftObjectPath::read(ar)?),
            StructType::GameplayTagContainer => {
                StructValue::GameplayTagContainer(GameplayTagContainer::read(ar)?)
            }
            StructType::Struct(_) => StructValue::Struct(read_properties_until_none(ar)?),
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        match self {
            StructValue::Guid(v) => v.write(ar)?,
            StructValue::DateTime(v) => ar.write_u64::<LE>(*v)?,
            StructValue::Timespan(v) => ar.write_i64::<LE>(*v)?,
            StructValue::Vector2D(v) => v.write(ar)?,
            StructValue::Vector(v) => v.write(ar)?,
            StructValue::IntVector(v) => v.write(ar)?,
            StructValue::IntPoint(v) => v.write(ar)?,
            StructValue::Box(v) => v.write(ar)?,
            StructValue::Quat(v) => v.write(ar)?,
            StructValue::Rotator(v) => v.write(ar)?,
            StructValue::LinearColor(v) => v.write(ar)?,
            StructValue::Color(v) => v.write(ar)?,
            StructValue::SoftObjectPath(v) => v.write(ar)?,
            StructValue::GameplayTagContainer(v) => v.write(ar)?,
            StructValue::Struct(v) => write_properties_none_terminated(ar, v)?,
        }
        Ok(())
    }
    /// Whether this value has the layout of `t`.
    pub(crate) fn matches(&self, t: &StructType) -> bool {
        matches!(
            (self, t),
            (StructValue::Guid(_), StructType::Guid)
                | (StructValue::DateTime(_), StructType::DateTime)
                | (StructValue::Timespan(_), StructType::Timespan)
                | (StructValue::Vector2D(_), StructType::Vector2D)
                | (StructValue::Vector(_), StructType::Vector)
                | (StructValue::IntVector(_), StructType::IntVector)
                | (StructValue::IntPoint(_), StructType::IntPoint)
                | (StructValue::Box(_), StructType::Box)
                | (StructValue::Quat(_), StructType::Quat)
                | (StructValue::Rotator(_), StructType::Rotator)
                | (StructValue::LinearColor(_), StructType::LinearColor)
                | (StructValue::Color(_), StructType::Color)
                | (StructValue::SoftObjectPath(_), StructType::SoftObjectPath)
                | (StructValue::GameplayTagContainer(_), StructType::GameplayTagContainer)
                | (StructValue::Struct(_), StructType::Struct(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FTextHistory {
    /// Text that is not localized, optionally with a culture invariant string
    None { culture_invariant: Option<FString> },
    Base {
        namespace: FString,
        key: FString,
        source_string: FString,
    },
}

/// Localizable text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FText {
    pub flags: u32,
    pub history: FTextHistory,
    /// Display string substituted from a localization table; never serialized
    #[serde(skip)]
    pub localized: Option<String>,
}
impl FText {
    pub fn new_base(
        namespace: impl Into<FString>,
        key: impl Into<FString>,
        source_string: impl Into<FString>,
    ) -> Self {
        Self {
            flags: 0,
            history: FTextHistory::Base {
                namespace: namespace.into(),
                key: key.into(),
                source_string: source_string.into(),
            },
            localized: None,
        }
    }
    /// Localized string if one was applied, else the source string.
    pub fn text(&self) -> Option<&str> {
        if let Some(localized) = &self.localized {
            return Some(localized);
        }
        match &self.history {
            FTextHistory::None { culture_invariant } => {
                culture_invariant.as_ref().map(FString::as_str)
            }
            FTextHistory::Base { source_string, .. } => Some(source_string.as_str()),
        }
    }
    #[instrument(name = "FText_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A) -> Result<Self> {
        let flags = ar.read_u32::<LE>()?;
        let history = match ar.read_i8()? {
            -1 => FTextHistory::None {
                culture_invariant: if ar.read_bool32()? {
                    Some(ar.read_fstring()?)
                } else {
                    None
                },
            },
            0 => FTextHistory::Base {
                namespace: ar.read_fstring()?,
                key: ar.read_fstring()?,
                source_string: ar.read_fstring()?,
            },
            other => return Err(Error::UnsupportedTextHistory(other)),
        };
        Ok(Self {
            flags,
            history,
            localized: None,
        })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u32::<LE>(self.flags)?;
        match &self.history {
            FTextHistory::None { culture_invariant } => {
                ar.write_i8(-1)?;
                ar.write_bool32(culture_invariant.is_some())?;
                if let Some(culture_invariant) = culture_invariant {
                    ar.write_fstring(culture_invariant)?;
                }
            }
            FTextHistory::Base {
                namespace,
                key,
                source_string,
            } => {
                ar.write_i8(0)?;
                ar.write_fstring(namespace)?;
                ar.write_fstring(key)?;
                ar.write_fstring(source_string)?;
            }
        }
        Ok(())
    }
}

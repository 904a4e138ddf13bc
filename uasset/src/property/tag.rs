use std::io::{Seek, SeekFrom, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    context::DiagnosticKind,
    read_bytes,
    tables::FName,
    Error, FGuid, Result,
};

use super::{ByteValue, FPropertyTagData, FPropertyTagType, ValueContext};

/// One serialized property: header plus value.
///
/// The value is decoded when the kind is understood. When it is not, or when
/// the decoded length disagrees with `size`, the declared bytes are kept
/// verbatim and written back unchanged until a new value is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FPropertyTag {
    pub name: FName,
    pub property_type: FName,
    /// Byte length of the value as declared in the stream. Recomputed from
    /// the value when the tag is written.
    pub size: i32,
    pub array_index: i32,
    pub tag_data: Option<FPropertyTagData>,
    pub has_property_guid: bool,
    pub property_guid: Option<FGuid>,
    value: Option<FPropertyTagType>,
    #[serde(skip)]
    raw: Option<Vec<u8>>,
}

impl FPropertyTag {
    /// Tag for a value built in memory, with tag data derived from the value.
    ///
    /// Enum and byte labels must be written `Type::Value` so the enum type
    /// can be recorded in the tag data.
    pub fn new(name: impl Into<FName>, value: FPropertyTagType) -> Result<Self> {
        let tag_data = FPropertyTagData::for_value(&value);
        check_tag_data(tag_data.as_ref(), &value)?;
        Ok(Self {
            name: name.into(),
            property_type: FName::new(value.property_type().get_name()),
            size: 0,
            array_index: 0,
            tag_data,
            has_property_guid: false,
            property_guid: None,
            value: Some(value),
            raw: None,
        })
    }
    pub fn with_array_index(mut self, array_index: i32) -> Self {
        self.array_index = array_index;
        self
    }
    pub fn value(&self) -> Option<&FPropertyTagType> {
        self.value.as_ref()
    }
    /// Mutable access to the decoded value. Any preserved raw bytes are
    /// dropped so the value is re-encoded on write.
    pub fn value_mut(&mut self) -> Option<&mut FPropertyTagType> {
        if self.value.is_some() {
            self.raw = None;
        }
        self.value.as_mut()
    }
    /// Mutable access that keeps raw bytes, for edits that do not change the
    /// serialized form.
    pub(crate) fn value_mut_keep_raw(&mut self) -> Option<&mut FPropertyTagType> {
        self.value.as_mut()
    }
    /// Replaces the value. The value must be of this tag's kind and agree
    /// with its tag data on whether an enum label is stored.
    pub fn set_value(&mut self, value: FPropertyTagType) -> Result<()> {
        value.check_type(self.property_type.as_str())?;
        check_tag_data(self.tag_data.as_ref(), &value)?;
        if let (FPropertyTagType::Bool(value), Some(FPropertyTagData::Bool(flag))) =
            (&value, &mut self.tag_data)
        {
            *flag = *value;
        }
        self.value = Some(value);
        self.raw = None;
        Ok(())
    }
    /// Verbatim value bytes kept for an undecodable or mis-sized value.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }
    /// Copy of the header with the given size and no value, as written ahead
    /// of the elements of a struct array.
    pub(crate) fn header_only(&self, size: i32) -> Self {
        Self {
            size,
            value: None,
            raw: None,
            ..self.clone()
        }
    }

    fn wrap(&self, error: Error) -> Error {
        Error::Property {
            name: self.name.to_string(),
            kind: self.property_type.to_string(),
            source: Box::new(error),
        }
    }

    /// Reads one tag, or `None` at the `None` terminator.
    ///
    /// With `read_value` unset only the header is consumed, as for the inner
    /// tag of a struct array.
    #[instrument(name = "FPropertyTag_read", skip_all)]
    pub fn read<A: ArchiveReader>(ar: &mut A, read_value: bool) -> Result<Option<Self>> {
        let name = ar.read_fname()?;
        if name.is_none() {
            return Ok(None);
        }
        let property_type = ar.read_fname()?;
        let size = ar.read_i32::<LE>()?;
        if size < 0 {
            return Err(Error::format(format!(
                "property {name} declares negative size {size}"
            )));
        }
        let array_index = ar.read_i32::<LE>()?;
        let tag_data = FPropertyTagData::read(ar, property_type.as_str())?;
        let has_property_guid = ar.read_flag()?;
        let property_guid = if has_property_guid {
            Some(FGuid::read(ar)?)
        } else {
            None
        };
        let mut tag = Self {
            name,
            property_type,
            size,
            array_index,
            tag_data,
            has_property_guid,
            property_guid,
            value: None,
            raw: None,
        };
        if read_value {
            let scope = tag.name.to_string();
            ar.with_scope(&scope, |ar| tag.read_value(ar))
                .map_err(|e| tag.wrap(e))?;
        }
        Ok(Some(tag))
    }

    fn read_value<A: ArchiveReader>(&mut self, ar: &mut A) -> Result<()> {
        let start = ar.position()?;
        let value = FPropertyTagType::read(
            ar,
            self.property_type.as_str(),
            self.tag_data.as_ref(),
            ValueContext::Normal,
        )?;
        let consumed = ar.position()? as i64 - start as i64;
        match value {
            Some(value) => {
                if consumed != self.size as i64 {
                    ar.report(
                        DiagnosticKind::PropertySizeMismatch,
                        format!(
                            "declared {} bytes but decoded {consumed}, keeping the declared bytes",
                            self.size
                        ),
                    )?;
                    self.raw = Some(read_declared(ar, start, self.size)?);
                }
                self.value = Some(value);
            }
            None => self.raw = Some(read_declared(ar, start, self.size)?),
        }
        Ok(())
    }

    /// Writes the tag. With `write_value` the value follows the header and
    /// `size` is taken from the encoded value; otherwise only the header is
    /// written with the declared `size`.
    pub fn write<A: ArchiveWriter>(&self, ar: &mut A, write_value: bool) -> Result<()> {
        if let (Some(value), None) = (&self.value, &self.raw) {
            check_tag_data(self.tag_data.as_ref(), value).map_err(|e| self.wrap(e))?;
        }
        let payload = if write_value {
            Some(self.payload(ar).map_err(|e| self.wrap(e))?)
        } else {
            if let Some(value) = &self.value {
                let encoded = ar
                    .measure(|ar| value.write(ar, ValueContext::Normal))
                    .map_err(|e| self.wrap(e))?;
                if encoded.len() as i64 != self.size as i64 {
                    return Err(Error::SizeMismatch {
                        context: format!("property {}", self.name),
                        declared: self.size as i64,
                        actual: encoded.len() as i64,
                    });
                }
            }
            None
        };
        let size = match &payload {
            Some(payload) => i32::try_from(payload.len())
                .map_err(|_| Error::format(format!("property {} is too large", self.name)))?,
            None => self.size,
        };

        ar.write_fname(&self.name)?;
        ar.write_fname(&self.property_type)?;
        ar.write_i32::<LE>(size)?;
        ar.write_i32::<LE>(self.array_index)?;
        match (&self.tag_data, &self.value) {
            (Some(FPropertyTagData::Bool(_)), Some(FPropertyTagType::Bool(value))) => {
                FPropertyTagData::Bool(*value).write(ar)?
            }
            (Some(tag_data), _) => tag_data.write(ar)?,
            (None, _) => {}
        }
        ar.write_flag(self.has_property_guid)?;
        if self.has_property_guid {
            let Some(guid) = &self.property_guid else {
                return Err(Error::format(format!(
                    "property {} is flagged with a GUID but has none",
                    self.name
                )));
            };
            guid.write(ar)?;
        }
        if let Some(payload) = payload {
            ar.write_all(&payload)?;
        }
        Ok(())
    }

    fn payload<A: ArchiveWriter>(&self, ar: &mut A) -> Result<Vec<u8>> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        match &self.value {
            Some(value) => ar.measure(|ar| value.write(ar, ValueContext::Normal)),
            None => Err(Error::format(format!(
                "property {} has neither a value nor raw bytes",
                self.name
            ))),
        }
    }
}

/// Rewinds to `start` and reads the `size` declared bytes, leaving the
/// cursor at the end of the value.
fn read_declared<A: ArchiveReader>(ar: &mut A, start: u64, size: i32) -> Result<Vec<u8>> {
    ar.seek(SeekFrom::Start(start))?;
    read_bytes(ar, size as u64)
}

/// An enum or byte value is stored as a name exactly when the tag data names
/// an enum type, so the value has to carry a label in that case and only then.
fn check_tag_data(tag_data: Option<&FPropertyTagData>, value: &FPropertyTagType) -> Result<()> {
    let (enum_type, has_label) = match (tag_data, value) {
        (Some(FPropertyTagData::Enum(enum_type)), FPropertyTagType::Enum(label)) => {
            (enum_type, label.is_some())
        }
        (Some(FPropertyTagData::Byte(enum_type)), FPropertyTagType::Byte(byte)) => {
            (enum_type, matches!(byte, ByteValue::Label(_)))
        }
        _ => return Ok(()),
    };
    match (enum_type.is_none(), has_label) {
        (false, false) => Err(Error::type_mismatch(
            format!("label of enum {enum_type}"),
            "unlabelled value",
        )),
        (true, true) => Err(Error::type_mismatch(
            "unlabelled value for a tag without an enum type",
            format!("label {}", value_label(value)),
        )),
        _ => Ok(()),
    }
}

fn value_label(value: &FPropertyTagType) -> &str {
    value.as_name().map(FName::as_str).unwrap_or_default()
}

use std::io::Write;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    tables::FName,
    Error, Result,
};

use super::{
    FPropertyTag, FPropertyTagData, FPropertyTagType, PropertyType, StructType, StructValue,
    ValueContext,
};

/// A struct value together with the type it was decoded as.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptStruct {
    pub struct_type: StructType,
    pub value: StructValue,
}
impl ScriptStruct {
    /// Fails with [`Error::TypeMismatch`] if `value` does not have the layout
    /// of `struct_type`.
    pub fn new(struct_type: StructType, value: StructValue) -> Result<Self> {
        if !value.matches(&struct_type) {
            return Err(Error::type_mismatch(
                struct_type.as_str(),
                format!("{value:?}"),
            ));
        }
        Ok(Self { struct_type, value })
    }
    #[instrument(name = "ScriptStruct_read", skip(ar))]
    pub(crate) fn read<A: ArchiveReader>(ar: &mut A, struct_type: StructType) -> Result<Self> {
        let value = StructValue::read(ar, &struct_type)?;
        Ok(Self { struct_type, value })
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        self.value.write(ar)
    }
}

fn needs_inner_tag(inner_type: &FName) -> bool {
    PropertyType::from_name(inner_type.as_str()).is_some_and(|t| t.has_inner_tag())
}

fn check_element(expected: &FName, value: &FPropertyTagType) -> Result<()> {
    value.check_type(expected.as_str())
}

/// Reads `count` elements of `kind`, stopping with `None` at the first one
/// whose kind is not understood.
fn read_elements<A: ArchiveReader>(
    ar: &mut A,
    count: u32,
    kind: &FName,
    tag_data: Option<&FPropertyTagData>,
    context: ValueContext,
) -> Result<Option<Vec<FPropertyTagType>>> {
    let mut elements = vec![];
    for _ in 0..count {
        match FPropertyTagType::read(ar, kind.as_str(), tag_data, context)? {
            Some(element) => elements.push(element),
            None => return Ok(None),
        }
    }
    Ok(Some(elements))
}

fn write_elements<A: ArchiveWriter>(
    ar: &mut A,
    kind: &FName,
    elements: &[FPropertyTagType],
    context: ValueContext,
) -> Result<()> {
    for element in elements {
        check_element(kind, element)?;
        element.write(ar, context)?;
    }
    Ok(())
}

/// `ArrayProperty` value.
///
/// Arrays of structs and arrays of arrays carry an inner tag ahead of the
/// elements which describes the element type and the byte size of all
/// elements together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptArray {
    pub inner_type: FName,
    pub inner_tag: Option<Box<FPropertyTag>>,
    pub elements: Vec<FPropertyTagType>,
}
impl ScriptArray {
    pub fn new(inner_type: impl Into<FName>) -> Self {
        Self {
            inner_type: inner_type.into(),
            inner_tag: None,
            elements: vec![],
        }
    }
    pub fn push(&mut self, element: FPropertyTagType) -> Result<()> {
        check_element(&self.inner_type, &element)?;
        self.elements.push(element);
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    #[instrument(name = "ScriptArray_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(
        ar: &mut A,
        tag_data: Option<&FPropertyTagData>,
    ) -> Result<Option<Self>> {
        let Some(FPropertyTagData::Array(inner_type)) = tag_data else {
            return Err(Error::format("ArrayProperty without an inner type"));
        };
        let count = ar.read_u32::<LE>()?;
        let inner_tag = if needs_inner_tag(inner_type) {
            match FPropertyTag::read(ar, false)? {
                Some(tag) => Some(Box::new(tag)),
                None => {
                    return Err(Error::format(format!(
                        "array of {inner_type} is missing its inner tag"
                    )))
                }
            }
        } else {
            None
        };
        let element_data = inner_tag.as_ref().and_then(|tag| tag.tag_data.as_ref());
        let Some(elements) = read_elements(
            ar,
            count,
            inner_type,
            element_data,
            ValueContext::ArrayElement,
        )?
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            inner_type: inner_type.clone(),
            inner_tag,
            elements,
        }))
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u32::<LE>(self.elements.len() as u32)?;
        if !needs_inner_tag(&self.inner_type) {
            return write_elements(
                ar,
                &self.inner_type,
                &self.elements,
                ValueContext::ArrayElement,
            );
        }
        let Some(inner_tag) = &self.inner_tag else {
            return Err(Error::format(format!(
                "array of {} has no inner tag",
                self.inner_type
            )));
        };
        let bytes = ar.measure(|ar| {
            write_elements(
                ar,
                &self.inner_type,
                &self.elements,
                ValueContext::ArrayElement,
            )
        })?;
        inner_tag.header_only(bytes.len() as i32).write(ar, false)?;
        ar.write_all(&bytes)?;
        Ok(())
    }
}

/// `SetProperty` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptSet {
    pub element_type: FName,
    /// Elements removed relative to the archetype
    pub removed: Vec<FPropertyTagType>,
    pub elements: Vec<FPropertyTagType>,
}
impl ScriptSet {
    pub fn new(element_type: impl Into<FName>) -> Self {
        Self {
            element_type: element_type.into(),
            removed: vec![],
            elements: vec![],
        }
    }
    /// Adds `element` unless an equal one is already present.
    pub fn insert(&mut self, element: FPropertyTagType) -> Result<bool> {
        check_element(&self.element_type, &element)?;
        if self.elements.contains(&element) {
            return Ok(false);
        }
        self.elements.push(element);
        Ok(true)
    }
    #[instrument(name = "ScriptSet_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(
        ar: &mut A,
        tag_data: Option<&FPropertyTagData>,
    ) -> Result<Option<Self>> {
        let Some(FPropertyTagData::Set(element_type)) = tag_data else {
            return Err(Error::format("SetProperty without an element type"));
        };
        let num_to_remove = ar.read_i32::<LE>()?;
        let num_to_remove = u32::try_from(num_to_remove).map_err(|_| {
            Error::format(format!("negative set removal count {num_to_remove}"))
        })?;
        let Some(removed) = read_elements(
            ar,
            num_to_remove,
            element_type,
            None,
            ValueContext::ArrayElement,
        )?
        else {
            return Ok(None);
        };
        let count = ar.read_u32::<LE>()?;
        let Some(elements) =
            read_elements(ar, count, element_type, None, ValueContext::ArrayElement)?
        else {
            return Ok(None);
        };
        Ok(Some(Self {
            element_type: element_type.clone(),
            removed,
            elements,
        }))
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.removed.len() as i32)?;
        write_elements(
            ar,
            &self.element_type,
            &self.removed,
            ValueContext::ArrayElement,
        )?;
        ar.write_u32::<LE>(self.elements.len() as u32)?;
        write_elements(
            ar,
            &self.element_type,
            &self.elements,
            ValueContext::ArrayElement,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEntry {
    pub key: FPropertyTagType,
    pub value: FPropertyTagType,
}

/// `MapProperty` value. Entries keep their serialized order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptMap {
    pub key_type: FName,
    pub value_type: FName,
    /// Keys removed relative to the archetype
    pub removed: Vec<FPropertyTagType>,
    pub entries: Vec<MapEntry>,
}
impl ScriptMap {
    pub fn new(key_type: impl Into<FName>, value_type: impl Into<FName>) -> Self {
        Self {
            key_type: key_type.into(),
            value_type: value_type.into(),
            removed: vec![],
            entries: vec![],
        }
    }
    /// Sets the value for `key`, returning the previous value if there was one.
    pub fn insert(
        &mut self,
        key: FPropertyTagType,
        value: FPropertyTagType,
    ) -> Result<Option<FPropertyTagType>> {
        check_element(&self.key_type, &key)?;
        check_element(&self.value_type, &value)?;
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == key) {
            return Ok(Some(std::mem::replace(&mut entry.value, value)));
        }
        self.entries.push(MapEntry { key, value });
        Ok(None)
    }
    pub fn get(&self, key: &FPropertyTagType) -> Option<&FPropertyTagType> {
        self.entries
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| &entry.value)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, MapEntry> {
        self.entries.iter()
    }
    #[instrument(name = "ScriptMap_read", skip_all)]
    pub(crate) fn read<A: ArchiveReader>(
        ar: &mut A,
        tag_data: Option<&FPropertyTagData>,
    ) -> Result<Option<Self>> {
        let Some(FPropertyTagData::Map {
            key_type,
            value_type,
        }) = tag_data
        else {
            return Err(Error::format("MapProperty without key and value types"));
        };
        let num_to_remove = ar.read_i32::<LE>()?;
        let num_to_remove = u32::try_from(num_to_remove).map_err(|_| {
            Error::format(format!("negative map removal count {num_to_remove}"))
        })?;
        let Some(removed) = ar.with_scope("Key", |ar| {
            read_elements(ar, num_to_remove, key_type, None, ValueContext::MapElement)
        })?
        else {
            return Ok(None);
        };
        let count = ar.read_u32::<LE>()?;
        let mut entries = vec![];
        for _ in 0..count {
            let key = ar.with_scope("Key", |ar| {
                FPropertyTagType::read(ar, key_type.as_str(), None, ValueContext::MapElement)
            })?;
            let Some(key) = key else {
                return Ok(None);
            };
            let value = ar.with_scope("Value", |ar| {
                FPropertyTagType::read(ar, value_type.as_str(), None, ValueContext::MapElement)
            })?;
            let Some(value) = value else {
                return Ok(None);
            };
            entries.push(MapEntry { key, value });
        }
        Ok(Some(Self {
            key_type: key_type.clone(),
            value_type: value_type.clone(),
            removed,
            entries,
        }))
    }
    pub(crate) fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_i32::<LE>(self.removed.len() as i32)?;
        write_elements(ar, &self.key_type, &self.removed, ValueContext::MapElement)?;
        ar.write_u32::<LE>(self.entries.len() as u32)?;
        for entry in &self.entries {
            check_element(&self.key_type, &entry.key)?;
            check_element(&self.value_type, &entry.value)?;
            entry.key.write(ar, ValueContext::MapElement)?;
            entry.value.write(ar, ValueContext::MapElement)?;
        }
        Ok(())
    }
}

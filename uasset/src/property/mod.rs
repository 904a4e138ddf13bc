//! Tagged property serialization.
//!
//! Every export body is a list of [`FPropertyTag`]s terminated by a tag named
//! `None`. Each tag carries its kind name, the byte size of its value and any
//! kind specific [`FPropertyTagData`], followed by the value itself.

mod script;
mod structs;
mod tag;
mod tag_data;
mod value;

pub use script::{MapEntry, ScriptArray, ScriptMap, ScriptSet, ScriptStruct};
pub use structs::{
    Box, Color, FSoftObjectPath, FText, FTextHistory, GameplayTagContainer, IntPoint, IntVector,
    LinearColor, Quat, Rotator, StructType, StructValue, Vector, Vector2D,
};
pub use tag::FPropertyTag;
pub use tag_data::FPropertyTagData;
pub use value::{ByteValue, FPropertyTagType, FScriptDelegate, PropertyType, ValueContext};

use serde::{Serialize, Serializer};
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    context::DiagnosticKind,
    tables::FName,
    Result,
};

/// Array index and name of a property within one property list.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey(pub u32, pub String);
impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        Self(0, value)
    }
}
impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        Self(0, value.to_string())
    }
}
impl From<(&str, u32)> for PropertyKey {
    fn from((name, index): (&str, u32)) -> Self {
        Self(index, name.to_string())
    }
}
impl Serialize for PropertyKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}_{}", self.1, self.0))
    }
}

/// Ordered property list of an object or struct.
///
/// Tags are kept in stream order, including repeats of the same name and
/// array index. Lookups by key see the last such tag.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Properties(pub Vec<FPropertyTag>);
impl Properties {
    pub fn new() -> Self {
        Self::default()
    }
    /// Replace the last tag with the same name and array index as `tag`, or
    /// append it when there is none.
    pub fn insert(&mut self, tag: FPropertyTag) -> Option<FPropertyTag> {
        match self.position(&key_of(&tag)) {
            Some(index) => Some(std::mem::replace(&mut self.0[index], tag)),
            None => {
                self.0.push(tag);
                None
            }
        }
    }
    /// Append `tag` even if one with the same key is already present.
    pub fn push(&mut self, tag: FPropertyTag) {
        self.0.push(tag);
    }
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<&FPropertyTag> {
        let index = self.position(&key.into())?;
        self.0.get(index)
    }
    pub fn get_mut(&mut self, key: impl Into<PropertyKey>) -> Option<&mut FPropertyTag> {
        let index = self.position(&key.into())?;
        self.0.get_mut(index)
    }
    /// Decoded value of a property, `None` if absent or undecodable.
    pub fn get_value(&self, key: impl Into<PropertyKey>) -> Option<&FPropertyTagType> {
        self.get(key).and_then(FPropertyTag::value)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, FPropertyTag> {
        self.0.iter()
    }
    fn position(&self, key: &PropertyKey) -> Option<usize> {
        self.0.iter().rposition(|tag| key_of(tag) == *key)
    }
}
fn key_of(tag: &FPropertyTag) -> PropertyKey {
    PropertyKey(tag.array_index as u32, tag.name.to_string())
}
impl<K> std::ops::Index<K> for Properties
where
    K: Into<PropertyKey>,
{
    type Output = FPropertyTag;
    fn index(&self, index: K) -> &Self::Output {
        let key = index.into();
        match self.get(key.clone()) {
            Some(tag) => tag,
            None => panic!("no property {}[{}]", key.1, key.0),
        }
    }
}
impl<'a> IntoIterator for &'a Properties {
    type Item = &'a FPropertyTag;
    type IntoIter = std::slice::Iter<'a, FPropertyTag>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
impl FromIterator<FPropertyTag> for Properties {
    fn from_iter<T: IntoIterator<Item = FPropertyTag>>(iter: T) -> Self {
        let mut properties = Properties::new();
        for tag in iter {
            properties.insert(tag);
        }
        properties
    }
}
impl Serialize for Properties {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|tag| (key_of(tag), tag)))
    }
}

#[instrument(skip_all)]
pub(crate) fn read_properties_until_none<A: ArchiveReader>(ar: &mut A) -> Result<Properties> {
    let mut properties = Properties::default();
    while let Some(tag) = FPropertyTag::read(ar, true)? {
        if properties.get(key_of(&tag)).is_some() {
            ar.report(
                DiagnosticKind::DuplicateProperty,
                format!(
                    "property {}[{}] appears more than once, lookups see the last",
                    tag.name, tag.array_index
                ),
            )?;
        }
        properties.push(tag);
    }
    Ok(properties)
}
#[instrument(skip_all)]
pub(crate) fn write_properties_none_terminated<A: ArchiveWriter>(
    ar: &mut A,
    properties: &Properties,
) -> Result<()> {
    for tag in properties {
        tag.write(ar, true)?;
    }
    ar.write_fname(&FName::none())?;
    Ok(())
}

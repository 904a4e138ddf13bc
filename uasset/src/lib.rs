/*!
A library for reading and writing Unreal Engine cooked asset packages.

A cooked package is split into a header blob (`.uasset`: file summary plus the
name, import and export tables), an export data blob (`.uexp`) and an optional
bulk data blob (`.ubulk`). Export data is a sequence of tagged properties which
are decoded into [`FPropertyTagType`] values and can be written back out
byte-for-byte.

Exports are constructed through an [`ExportRegistry`]. Unknown export classes
fall back to [`UObject`], a plain property bag.

# Example

```no_run
use uasset::{CharacterUIData, Export, FPropertyTagType, Package};

let uasset = std::fs::read("Gumshoe_PrimaryAsset.uasset")?;
let uexp = std::fs::read("Gumshoe_PrimaryAsset.uexp")?;
let mut package = Package::read("Gumshoe_PrimaryAsset", &uasset, &uexp, None)?;

if let Some(ui_data) = package.export_of_type::<CharacterUIData>() {
    for (slot, index) in &ui_data.abilities {
        println!("{slot:?} -> {}", package.export_type(*index).unwrap_or("?"));
    }
}
if let Some(FPropertyTagType::Int(value)) = package.exports()[0].properties().get_value("Health") {
    println!("health {value}");
}

let written = package.write()?;
assert_eq!(written.uasset, uasset);
assert_eq!(written.uexp, uexp);
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

mod archive;
mod context;
mod error;
pub mod export;
mod package;
pub mod property;
mod summary;
mod tables;

#[cfg(test)]
mod tests;

pub use archive::{ArchiveReader, ArchiveWriter};
pub use context::{
    AssetReader, AssetWriter, Context, Diagnostic, DiagnosticKind, Diagnostics, PayloadType, Types,
};
pub use error::{Error, PackageFile, ParseError};
pub use export::{
    CharacterAbilityUIData, CharacterUIData, ECharacterAbilitySlot, Export, ExportContext,
    ExportFactory, ExportRegistry, Localization, Siblings, UObject,
};
pub use package::{Package, PackageBuffers, PackageHeader, PackageReader};
pub use property::{
    ByteValue, FPropertyTag, FPropertyTagData, FPropertyTagType, FSoftObjectPath, FText,
    FTextHistory, MapEntry, Properties, PropertyKey, PropertyType, ScriptArray, ScriptMap,
    ScriptSet, ScriptStruct, StructType, StructValue, ValueContext,
};
pub use summary::{
    FCompressedChunk, FCustomVersion, FEngineVersion, FGenerationInfo, FPackageFileSummary,
    PackageFlags, PACKAGE_MAGIC,
};
pub use tables::{
    FName, FNameEntry, FObjectExport, FObjectImport, FPackageIndex, ObjectFlags, PackageTables,
};

use std::io::Read;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use serde::{Serialize, Serializer};
use tracing::instrument;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Length-prefixed engine string.
///
/// A string read from a package remembers whether it was stored as ANSI or
/// UTF-16 along with every byte from its terminator up to the declared
/// length, and is written back exactly as read. Strings built in memory are
/// written the way the engine writes them: ASCII as ANSI, anything else as
/// UTF-16, both null terminated. Equality only compares the text.
#[derive(Debug, Clone, Default)]
pub struct FString {
    text: String,
    wide: bool,
    trailing: Option<Vec<u8>>,
}
impl FString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            wide: false,
            trailing: None,
        }
    }
    pub fn as_str(&self) -> &str {
        &self.text
    }
    pub fn into_string(self) -> String {
        self.text
    }
    /// Whether the string is stored as UTF-16.
    pub fn is_wide(&self) -> bool {
        match self.trailing {
            Some(_) => self.wide,
            None => !self.text.is_ascii(),
        }
    }
}
impl PartialEq for FString {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for FString {}
impl std::hash::Hash for FString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state)
    }
}
impl PartialEq<str> for FString {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}
impl PartialEq<&str> for FString {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}
impl From<&str> for FString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl From<String> for FString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
impl std::fmt::Display for FString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
impl Serialize for FString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
pub(crate) fn read_bytes<R: Read>(ar: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut bytes = vec![];
    ar.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, found {}", bytes.len()),
        )
        .into());
    }
    Ok(bytes)
}

#[instrument(skip_all)]
fn read_string<A: ArchiveReader>(ar: &mut A) -> Result<FString> {
    let len = ar.read_i32::<LE>()?;
    let wide = len < 0;
    let bytes = if wide {
        read_bytes(ar, len.unsigned_abs() as u64 * 2)?
    } else {
        read_bytes(ar, len as u64)?
    };
    let (text, terminator) = if wide {
        let chars: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let length = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
        (String::from_utf16(&chars[..length])?, length * 2)
    } else {
        let length = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
        // ANSI strings are Latin-1
        (bytes[..length].iter().copied().map(char::from).collect(), length)
    };
    Ok(FString {
        text,
        wide,
        trailing: Some(bytes[terminator..].to_vec()),
    })
}
#[instrument(skip_all)]
fn write_string<A: ArchiveWriter>(ar: &mut A, string: &FString) -> Result<()> {
    let text = &string.text;
    let (wide, trailing): (bool, &[u8]) = match &string.trailing {
        Some(trailing) => (string.wide, trailing),
        None if text.is_empty() => (false, &[]),
        None if text.is_ascii() => (false, &[0]),
        None => (true, &[0, 0]),
    };
    let too_long = || Error::format(format!("string of {} bytes is too long", text.len()));
    if wide {
        let chars: Vec<u16> = text.encode_utf16().collect();
        let len = i32::try_from(chars.len() + trailing.len() / 2).map_err(|_| too_long())?;
        ar.write_i32::<LE>(-len)?;
        for c in chars {
            ar.write_u16::<LE>(c)?;
        }
    } else {
        let chars = text
            .chars()
            .map(|c| u8::try_from(c).map_err(|_| Error::type_mismatch("Latin-1 text", text)))
            .collect::<Result<Vec<u8>>>()?;
        let len = i32::try_from(chars.len() + trailing.len()).map_err(|_| too_long())?;
        ar.write_i32::<LE>(len)?;
        ar.write_all(&chars)?;
    }
    ar.write_all(trailing)?;
    Ok(())
}

#[instrument(skip_all)]
fn read_array<T, F, A: ArchiveReader>(length: u32, ar: &mut A, f: F) -> Result<Vec<T>>
where
    F: Fn(&mut A) -> Result<T>,
{
    // the count comes from the stream, so grow as elements actually decode
    let mut items = vec![];
    for _ in 0..length {
        items.push(f(ar)?);
    }
    Ok(items)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FGuid {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl FGuid {
    pub fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }

    pub fn is_nil(&self) -> bool {
        self.a == 0 && self.b == 0 && self.c == 0 && self.d == 0
    }

    #[instrument(name = "FGuid_read", skip_all)]
    fn read<A: ArchiveReader>(ar: &mut A) -> Result<FGuid> {
        Ok(Self {
            a: ar.read_u32::<LE>()?,
            b: ar.read_u32::<LE>()?,
            c: ar.read_u32::<LE>()?,
            d: ar.read_u32::<LE>()?,
        })
    }
    fn write<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        ar.write_u32::<LE>(self.a)?;
        ar.write_u32::<LE>(self.b)?;
        ar.write_u32::<LE>(self.c)?;
        ar.write_u32::<LE>(self.d)?;
        Ok(())
    }
}

impl std::fmt::Display for FGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.b.to_le_bytes();
        let c = self.c.to_le_bytes();

        write!(
            f,
            "{:08x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:08x}",
            self.a, b[3], b[2], b[1], b[0], c[3], c[2], c[1], c[0], self.d,
        )
    }
}

impl Serialize for FGuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

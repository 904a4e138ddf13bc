use std::{
    any::Any,
    io::{Seek, SeekFrom, Write},
};

use serde::Serialize;
use tracing::instrument;

use crate::{
    archive::{ArchiveReader, ArchiveWriter},
    context::{AssetReader, AssetWriter, DiagnosticKind},
    property::{read_properties_until_none, write_properties_none_terminated},
    read_bytes, FGuid, FPropertyTagType, Properties, Result, StructValue,
};

use super::{Export, ExportContext, Localization};

/// Plain property bag, used for every export class without a dedicated type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UObject {
    pub export_type: String,
    pub properties: Properties,
    /// Whether a GUID flag follows the property list. Cooked exports always
    /// carry one unless the export ends right after its properties.
    pub guid_flag: bool,
    pub object_guid: Option<FGuid>,
    /// Bytes between the object GUID and the end of the export, kept verbatim
    pub extra: Vec<u8>,
}

impl UObject {
    pub fn new(export_type: impl Into<String>) -> Self {
        Self {
            export_type: export_type.into(),
            properties: Properties::new(),
            guid_flag: true,
            object_guid: None,
            extra: vec![],
        }
    }

    #[instrument(name = "UObject_read", skip_all)]
    pub fn read(ar: &mut AssetReader<'_>, context: &ExportContext<'_>) -> Result<Self> {
        let start = ar.position()?;
        let end = start.saturating_add(context.export.serial_size.max(0) as u64);
        let properties = read_properties_until_none(ar)?;

        let mut guid_flag = false;
        let mut object_guid = None;
        if ar.position()? + 4 <= end {
            let flag_start = ar.position()?;
            // Anything other than a bool32 here is not a GUID flag; keep it as extra.
            match ar.read_bool32() {
                // a set flag needs room for the GUID before the export ends
                Ok(true) if ar.position()? + 16 > end => {
                    ar.seek(SeekFrom::Start(flag_start))?;
                }
                Ok(has_guid) => {
                    guid_flag = true;
                    if has_guid {
                        object_guid = Some(FGuid::read(ar)?);
                    }
                }
                Err(crate::Error::InvalidBool(_)) => {
                    ar.seek(SeekFrom::Start(flag_start))?;
                }
                Err(e) => return Err(e),
            }
        }

        let mut extra = vec![];
        let position = ar.position()?;
        if position < end {
            extra = read_bytes(ar, end - position)?;
            ar.report(
                DiagnosticKind::TrailingBytes,
                format!("{} bytes after the object data, kept verbatim", extra.len()),
            )?;
        }

        Ok(Self {
            export_type: context.export_type.to_string(),
            properties,
            guid_flag,
            object_guid,
            extra,
        })
    }

    fn write_data<A: ArchiveWriter>(&self, ar: &mut A) -> Result<()> {
        write_properties_none_terminated(ar, &self.properties)?;
        if self.guid_flag {
            ar.write_bool32(self.object_guid.is_some())?;
            if let Some(guid) = &self.object_guid {
                guid.write(ar)?;
            }
        }
        ar.write_all(&self.extra)?;
        Ok(())
    }
}

impl Export for UObject {
    fn export_type(&self) -> &str {
        &self.export_type
    }
    fn properties(&self) -> &Properties {
        &self.properties
    }
    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
    fn write(&self, ar: &mut AssetWriter) -> Result<()> {
        self.write_data(ar)
    }
    fn apply_localization(&mut self, localization: &Localization) {
        localize_properties(&mut self.properties, localization);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) fn localize_properties(properties: &mut Properties, localization: &Localization) {
    for tag in properties.0.iter_mut() {
        if let Some(value) = tag.value_mut_keep_raw() {
            localize_value(value, localization);
        }
    }
}

fn localize_value(value: &mut FPropertyTagType, localization: &Localization) {
    match value {
        FPropertyTagType::Text(text) => {
            localization.localize(text);
        }
        FPropertyTagType::Struct(script_struct) => {
            if let StructValue::Struct(properties) = &mut script_struct.value {
                localize_properties(properties, localization);
            }
        }
        FPropertyTagType::Array(array) => {
            for element in &mut array.elements {
                localize_value(element, localization);
            }
        }
        FPropertyTagType::Set(set) => {
            for element in &mut set.elements {
                localize_value(element, localization);
            }
        }
        FPropertyTagType::Map(map) => {
            for entry in &mut map.entries {
                localize_value(&mut entry.value, localization);
            }
        }
        _ => {}
    }
}

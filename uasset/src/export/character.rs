use std::any::Any;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::instrument;

use crate::{
    context::{AssetReader, AssetWriter, DiagnosticKind},
    property::FText,
    tables::FPackageIndex,
    FPropertyTagType, Properties, Result,
};

use super::{object::UObject, Export, ExportContext, Localization, Siblings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ECharacterAbilitySlot {
    Ability1,
    Ability2,
    Grenade,
    Ultimate,
    Passive,
}
impl ECharacterAbilitySlot {
    const PREFIX: &'static str = "ECharacterAbilitySlot::";

    /// Parses `ECharacterAbilitySlot::Grenade` or just `Grenade`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.strip_prefix(Self::PREFIX).unwrap_or(name) {
            "Ability1" => Self::Ability1,
            "Ability2" => Self::Ability2,
            "Grenade" => Self::Grenade,
            "Ultimate" => Self::Ultimate,
            "Passive" => Self::Passive,
            _ => return None,
        })
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ability1 => "Ability1",
            Self::Ability2 => "Ability2",
            Self::Grenade => "Grenade",
            Self::Ultimate => "Ultimate",
            Self::Passive => "Passive",
        }
    }
}
impl std::fmt::Display for ECharacterAbilitySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.as_str())
    }
}

fn object(properties: &Properties, name: &str) -> Option<FPackageIndex> {
    properties.get_value(name).and_then(FPropertyTagType::as_object)
}
fn text(properties: &Properties, name: &str) -> Option<FText> {
    properties
        .get_value(name)
        .and_then(FPropertyTagType::as_text)
        .cloned()
}

/// Character UI asset.
///
/// The typed fields are read-only views extracted from `base`; edits are made
/// through `base.properties` and written from there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterUIData {
    pub base: UObject,
    pub bust_portrait: Option<FPackageIndex>,
    pub full_portrait: Option<FPackageIndex>,
    pub display_icon_small: Option<FPackageIndex>,
    pub display_icon: Option<FPackageIndex>,
    /// Raw package index of each slot's ability export
    pub abilities_with_index: IndexMap<ECharacterAbilitySlot, i32>,
    /// Arena index of each slot's [`CharacterAbilityUIData`], filled in by
    /// the link pass
    pub abilities: IndexMap<ECharacterAbilitySlot, usize>,
    pub wwise_state_name: Option<String>,
    pub display_name: Option<FText>,
    pub description: Option<FText>,
}

impl CharacterUIData {
    #[instrument(name = "CharacterUIData_read", skip_all)]
    pub fn read(ar: &mut AssetReader<'_>, context: &ExportContext<'_>) -> Result<Self> {
        let base = UObject::read(ar, context)?;
        let properties = &base.properties;

        let mut abilities_with_index = IndexMap::new();
        if let Some(map) = properties
            .get_value("Abilities")
            .and_then(FPropertyTagType::as_map)
        {
            for entry in map.iter() {
                let Some(label) = entry.key.as_name() else {
                    ar.report(
                        DiagnosticKind::UnknownEnumValue,
                        format!("ability slot key {:?} is not a name", entry.key),
                    )?;
                    continue;
                };
                let Some(slot) = ECharacterAbilitySlot::from_name(label.as_str()) else {
                    ar.report(
                        DiagnosticKind::UnknownEnumValue,
                        format!("unknown ability slot {label}"),
                    )?;
                    continue;
                };
                let Some(index) = entry.value.as_object() else {
                    ar.report(
                        DiagnosticKind::UnresolvedLink,
                        format!("ability {slot} does not reference an object"),
                    )?;
                    continue;
                };
                abilities_with_index.insert(slot, index.0);
            }
        }

        Ok(Self {
            bust_portrait: object(properties, "BustPortrait"),
            full_portrait: object(properties, "FullPortrait"),
            display_icon_small: object(properties, "DisplayIconSmall"),
            display_icon: object(properties, "DisplayIcon"),
            abilities_with_index,
            abilities: IndexMap::new(),
            wwise_state_name: properties
                .get_value("WwiseStateName")
                .and_then(FPropertyTagType::as_name)
                .map(ToString::to_string),
            display_name: text(properties, "DisplayName"),
            description: text(properties, "Description"),
            base,
        })
    }

    /// The linked ability export for `slot`.
    pub fn ability<'p>(
        &self,
        slot: ECharacterAbilitySlot,
        exports: &'p [Box<dyn Export>],
    ) -> Option<&'p CharacterAbilityUIData> {
        let index = *self.abilities.get(&slot)?;
        exports.get(index)?.as_any().downcast_ref()
    }
}

impl Export for CharacterUIData {
    fn export_type(&self) -> &str {
        &self.base.export_type
    }
    fn properties(&self) -> &Properties {
        &self.base.properties
    }
    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.base.properties
    }
    fn write(&self, ar: &mut AssetWriter) -> Result<()> {
        self.base.write(ar)
    }
    fn resolve_links(&mut self, siblings: &Siblings<'_>) -> Result<()> {
        self.abilities.clear();
        for (slot, package_index) in &self.abilities_with_index {
            let linked = FPackageIndex(*package_index)
                .export_index()
                .filter(|&i| siblings.get_as::<CharacterAbilityUIData>(i).is_some());
            match linked {
                Some(index) => {
                    self.abilities.insert(*slot, index);
                }
                None => siblings.report(
                    DiagnosticKind::UnresolvedLink,
                    format!("ability {slot} at {package_index} is not an ability export"),
                ),
            }
        }
        Ok(())
    }
    fn apply_localization(&mut self, localization: &Localization) {
        self.base.apply_localization(localization);
        for text in [&mut self.display_name, &mut self.description]
            .into_iter()
            .flatten()
        {
            localization.localize(text);
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// UI data of a single ability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterAbilityUIData {
    pub base: UObject,
    pub display_name: Option<FText>,
    pub description: Option<FText>,
    pub display_icon: Option<FPackageIndex>,
}

impl CharacterAbilityUIData {
    #[instrument(name = "CharacterAbilityUIData_read", skip_all)]
    pub fn read(ar: &mut AssetReader<'_>, context: &ExportContext<'_>) -> Result<Self> {
        let base = UObject::read(ar, context)?;
        Ok(Self {
            display_name: text(&base.properties, "DisplayName"),
            description: text(&base.properties, "Description"),
            display_icon: object(&base.properties, "DisplayIcon"),
            base,
        })
    }
}

impl Export for CharacterAbilityUIData {
    fn export_type(&self) -> &str {
        &self.base.export_type
    }
    fn properties(&self) -> &Properties {
        &self.base.properties
    }
    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.base.properties
    }
    fn write(&self, ar: &mut AssetWriter) -> Result<()> {
        self.base.write(ar)
    }
    fn apply_localization(&mut self, localization: &Localization) {
        self.base.apply_localization(localization);
        for text in [&mut self.display_name, &mut self.description]
            .into_iter()
            .flatten()
        {
            localization.localize(text);
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

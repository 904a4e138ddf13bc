use std::{any::Any, io::Cursor, rc::Rc};

use byteorder::{WriteBytesExt, LE};

use crate::{
    context::{Context, ContextState},
    property::{read_properties_until_none, write_properties_none_terminated},
    ArchiveReader, AssetReader, AssetWriter, ByteValue, CharacterAbilityUIData, CharacterUIData,
    DiagnosticKind, ECharacterAbilitySlot, Error, Export, ExportContext, ExportRegistry, FName,
    FNameEntry, FObjectExport, FObjectImport, FPackageIndex, FPropertyTag, FPropertyTagData,
    FPropertyTagType, FSoftObjectPath, FString, FText, Localization, Package, PackageFile,
    PackageFlags, PackageHeader, PackageReader, PackageTables, PayloadType, Properties, Result,
    ScriptArray, ScriptMap, ScriptStruct, StructType, StructValue, Types, UObject, PACKAGE_MAGIC,
};
use crate::property::{FScriptDelegate, Vector};

fn tables(names: &[&str]) -> Rc<PackageTables> {
    Rc::new(PackageTables {
        names: names.iter().map(|name| FNameEntry::new(*name)).collect(),
        ..Default::default()
    })
}

fn writer(names: &[&str]) -> AssetWriter {
    let mut state = ContextState::new(PackageFile::Scratch);
    state.tables = tables(names);
    Context::new(Cursor::new(vec![]), state)
}

fn reader<'a>(data: &'a [u8], names: &[&str]) -> AssetReader<'a> {
    let mut state = ContextState::new(PackageFile::Uexp);
    state.tables = tables(names);
    Context::new(Cursor::new(data), state)
}

fn encode_tag(tag: &FPropertyTag, names: &[&str]) -> Vec<u8> {
    let mut ar = writer(names);
    tag.write(&mut ar, true).unwrap();
    ar.into_inner().into_inner()
}

fn decode_tag(data: &[u8], names: &[&str]) -> FPropertyTag {
    let mut ar = reader(data, names);
    let tag = FPropertyTag::read(&mut ar, true).unwrap().unwrap();
    assert_eq!(ar.position().unwrap() as usize, data.len());
    tag
}

fn declared_size(encoded: &[u8]) -> i32 {
    i32::from_le_bytes([encoded[8], encoded[9], encoded[10], encoded[11]])
}

fn count(ar: &AssetReader<'_>, kind: DiagnosticKind) -> usize {
    ar.state.diagnostics.borrow().of_kind(kind).count()
}

const TAG_NAMES: &[&str] = &[
    "None",
    "bEnabled",
    "BoolProperty",
    "Flags",
    "ArrayProperty",
    "Mode",
    "EnumProperty",
    "EMode",
    "EMode::Fast",
    "Count",
    "IntProperty",
    "FloatProperty",
    "Scores",
    "MapProperty",
    "NameProperty",
    "Alice",
    "Bob",
    "Points",
    "StructProperty",
    "Vector",
    "Mystery",
    "MysteryProperty",
    "OnFire",
    "MulticastDelegateProperty",
    "Levels",
    "ByteProperty",
    "Title",
    "StrProperty",
    "Targets",
    "SoftObjectProperty",
    "/Game/Maps/Range",
    "OnHit",
    "DelegateProperty",
    "HandleHit",
    "Lazy",
    "LazyObjectProperty",
];

#[test]
fn bool_value_lives_in_tag_data() {
    let tag = FPropertyTag::new("bEnabled", FPropertyTagType::Bool(true)).unwrap();
    let encoded = encode_tag(&tag, TAG_NAMES);
    // name, type, size, array index, flag, guid flag
    assert_eq!(encoded.len(), 18);
    assert_eq!(declared_size(&encoded), 0);
    assert_eq!(encoded[16], 1);

    let decoded = decode_tag(&encoded, TAG_NAMES);
    assert_eq!(decoded.value(), Some(&FPropertyTagType::Bool(true)));
}

#[test]
fn bool_array_elements_take_one_byte() {
    let mut array = ScriptArray::new("BoolProperty");
    array.push(FPropertyTagType::Bool(true)).unwrap();
    array.push(FPropertyTagType::Bool(false)).unwrap();
    let tag = FPropertyTag::new("Flags", FPropertyTagType::Array(array.clone())).unwrap();

    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 4 + 2);
    assert_eq!(&encoded[encoded.len() - 2..], &[1, 0]);

    let decoded = decode_tag(&encoded, TAG_NAMES);
    assert_eq!(decoded.value(), Some(&FPropertyTagType::Array(array)));
}

#[test]
fn bool_array_rejects_other_values() {
    let mut data = vec![];
    // Flags: ArrayProperty of BoolProperty holding one element
    for value in [3i32, 4, 5, 0, 2] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.write_u32::<LE>(1).unwrap();
    data.write_u8(2).unwrap();
    let err = FPropertyTag::read(&mut reader(&data, TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::InvalidBool(2)));
}

#[test]
fn empty_enum_takes_no_bytes() {
    let tag = FPropertyTag::new("Mode", FPropertyTagType::Enum(None)).unwrap();
    assert_eq!(tag.tag_data, Some(FPropertyTagData::Enum(FName::none())));
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 0);
    assert_eq!(encoded.len(), 21);
    assert_eq!(
        decode_tag(&encoded, TAG_NAMES).value(),
        Some(&FPropertyTagType::Enum(None))
    );

    let tag =
        FPropertyTag::new("Mode", FPropertyTagType::Enum(Some("EMode::Fast".into()))).unwrap();
    assert_eq!(tag.tag_data, Some(FPropertyTagData::Enum("EMode".into())));
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 4);
    assert_eq!(
        decode_tag(&encoded, TAG_NAMES).value(),
        Some(&FPropertyTagType::Enum(Some("EMode::Fast".into())))
    );
}

#[test]
fn empty_enum_cannot_be_a_container_element() {
    let mut array = ScriptArray::new("EnumProperty");
    array.push(FPropertyTagType::Enum(None)).unwrap();
    let tag = FPropertyTag::new("Mode", FPropertyTagType::Array(array)).unwrap();
    let mut ar = writer(TAG_NAMES);
    let err = tag.write(&mut ar, true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::TypeMismatch { .. }));
}

#[test]
fn name_to_int_map_round_trips() {
    let mut map = ScriptMap::new("NameProperty", "IntProperty");
    map.insert(FPropertyTagType::Name("Alice".into()), FPropertyTagType::Int(3))
        .unwrap();
    map.insert(FPropertyTagType::Name("Bob".into()), FPropertyTagType::Int(5))
        .unwrap();
    assert!(matches!(
        map.insert(FPropertyTagType::Int(1), FPropertyTagType::Int(2)),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        map.insert(FPropertyTagType::Name("Bob".into()), FPropertyTagType::Float(1.0)),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(map.len(), 2);
    assert_eq!(
        map.get(&FPropertyTagType::Name("Bob".into())),
        Some(&FPropertyTagType::Int(5))
    );

    let tag = FPropertyTag::new("Scores", FPropertyTagType::Map(map.clone())).unwrap();
    let encoded = encode_tag(&tag, TAG_NAMES);
    // removed count, entry count, two name/int pairs
    assert_eq!(declared_size(&encoded), 4 + 4 + 2 * (4 + 4));

    let decoded = decode_tag(&encoded, TAG_NAMES);
    assert_eq!(decoded.value(), Some(&FPropertyTagType::Map(map)));
}

#[test]
fn map_with_mistyped_entry_is_not_written() {
    let mut map = ScriptMap::new("NameProperty", "IntProperty");
    map.entries.push(crate::MapEntry {
        key: FPropertyTagType::Name("Alice".into()),
        value: FPropertyTagType::Str("three".into()),
    });
    let tag = FPropertyTag::new("Scores", FPropertyTagType::Map(map)).unwrap();
    let err = tag.write(&mut writer(TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::TypeMismatch { .. }));
}

#[test]
fn byte_map_keys_are_widened() {
    let mut map = ScriptMap::new("ByteProperty", "IntProperty");
    map.insert(
        FPropertyTagType::Byte(ByteValue::Byte(7)),
        FPropertyTagType::Int(70),
    )
    .unwrap();
    map.insert(
        FPropertyTagType::Byte(ByteValue::Wide(300)),
        FPropertyTagType::Int(3000),
    )
    .unwrap();
    let tag = FPropertyTag::new("Levels", FPropertyTagType::Map(map.clone())).unwrap();
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 4 + 4 + 2 * (4 + 4));
    assert_eq!(&encoded[encoded.len() - 8..], &[44, 1, 0, 0, 184, 11, 0, 0]);
    assert_eq!(
        decode_tag(&encoded, TAG_NAMES).value(),
        Some(&FPropertyTagType::Map(map))
    );
}

fn vector(x: f32) -> FPropertyTagType {
    FPropertyTagType::Struct(
        ScriptStruct::new(
            StructType::Vector,
            StructValue::Vector(Vector { x, y: 0.0, z: 0.0 }),
        )
        .unwrap(),
    )
}

#[test]
fn struct_array_carries_inner_tag() {
    let mut array = ScriptArray::new("StructProperty");
    array.inner_tag = Some(Box::new(FPropertyTag::new("Points", vector(0.0)).unwrap()));
    array.push(vector(1.0)).unwrap();
    array.push(vector(2.0)).unwrap();
    let tag = FPropertyTag::new("Points", FPropertyTagType::Array(array)).unwrap();

    let encoded = encode_tag(&tag, TAG_NAMES);
    // count, inner tag header with struct type and guid, two vectors
    assert_eq!(declared_size(&encoded), 4 + 37 + 2 * 12);

    let decoded = decode_tag(&encoded, TAG_NAMES);
    let array = decoded.value().and_then(FPropertyTagType::as_array).unwrap();
    assert_eq!(array.elements, vec![vector(1.0), vector(2.0)]);
    let inner = array.inner_tag.as_deref().unwrap();
    assert_eq!(inner.size, 24);
    assert!(inner.value().is_none());
}

#[test]
fn struct_array_without_inner_tag_is_rejected() {
    let mut array = ScriptArray::new("StructProperty");
    array.push(vector(1.0)).unwrap();
    let tag = FPropertyTag::new("Points", FPropertyTagType::Array(array)).unwrap();
    let err = tag.write(&mut writer(TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Format(_)));
}

#[test]
fn struct_value_must_match_type() {
    assert!(matches!(
        ScriptStruct::new(StructType::Guid, StructValue::DateTime(0)),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn unknown_kind_is_skipped_by_declared_size() {
    let mut data = vec![];
    // Mystery: MysteryProperty, 6 bytes
    for value in [20i32, 21, 6, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    let value_start = data.len();
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
    // Count: IntProperty 42
    for value in [9i32, 10, 4, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.write_i32::<LE>(42).unwrap();
    data.write_i32::<LE>(0).unwrap();

    let mut ar = reader(&data, TAG_NAMES);
    let mystery = FPropertyTag::read(&mut ar, true).unwrap().unwrap();
    assert_eq!(ar.position().unwrap() as usize, value_start + 6);
    assert!(mystery.value().is_none());
    assert_eq!(mystery.raw(), Some(&[1, 2, 3, 4, 5, 6][..]));
    assert_eq!(count(&ar, DiagnosticKind::UnknownPropertyKind), 1);

    let mut ar = reader(&data, TAG_NAMES);
    let properties = read_properties_until_none(&mut ar).unwrap();
    assert_eq!(ar.position().unwrap() as usize, data.len());
    assert_eq!(properties.len(), 2);
    assert_eq!(
        properties.get_value("Count"),
        Some(&FPropertyTagType::Int(42))
    );

    let mut out = writer(TAG_NAMES);
    write_properties_none_terminated(&mut out, &properties).unwrap();
    assert_eq!(out.into_inner().into_inner(), data);
}

#[test]
fn size_mismatch_keeps_declared_bytes() {
    let mut data = vec![];
    // Count: IntProperty declaring 8 bytes for a 4 byte value
    for value in [9i32, 10, 8, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.write_i32::<LE>(42).unwrap();
    data.extend_from_slice(&[9, 9, 9, 9]);

    let mut ar = reader(&data, TAG_NAMES);
    let tag = FPropertyTag::read(&mut ar, true).unwrap().unwrap();
    assert_eq!(ar.position().unwrap() as usize, data.len());
    assert_eq!(tag.value(), Some(&FPropertyTagType::Int(42)));
    assert_eq!(tag.raw().map(<[u8]>::len), Some(8));
    assert_eq!(count(&ar, DiagnosticKind::PropertySizeMismatch), 1);
    let diagnostic = ar.state.diagnostics.borrow().iter().next().cloned().unwrap();
    assert_eq!(diagnostic.path, "Count");

    assert_eq!(encode_tag(&tag, TAG_NAMES), data);

    let mut tag = tag;
    tag.set_value(FPropertyTagType::Int(43)).unwrap();
    assert!(tag.raw().is_none());
    assert_eq!(declared_size(&encode_tag(&tag, TAG_NAMES)), 4);
}

#[test]
fn negative_size_is_rejected() {
    let mut data = vec![];
    for value in [9i32, 10, -1, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    let err = FPropertyTag::read(&mut reader(&data, TAG_NAMES), true).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
}

#[test]
fn multicast_delegates_are_unsupported() {
    let mut data = vec![];
    for value in [22i32, 23, 4, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.write_u32::<LE>(0).unwrap();

    let err = FPropertyTag::read(&mut reader(&data, TAG_NAMES), true).unwrap_err();
    match &err {
        Error::Property { name, kind, .. } => {
            assert_eq!(name, "OnFire");
            assert_eq!(kind, "MulticastDelegateProperty");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(
        err.root_cause(),
        Error::UnsupportedPropertyKind(kind) if kind == "MulticastDelegateProperty"
    ));
}

#[test]
fn set_value_checks_kind() {
    let mut tag = FPropertyTag::new("Count", FPropertyTagType::Int(1)).unwrap();
    assert!(matches!(
        tag.set_value(FPropertyTagType::Float(1.0)),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(tag.value(), Some(&FPropertyTagType::Int(1)));
    tag.set_value(FPropertyTagType::Int(2)).unwrap();
    assert_eq!(tag.value(), Some(&FPropertyTagType::Int(2)));

    let mut flag = FPropertyTag::new("bEnabled", FPropertyTagType::Bool(false)).unwrap();
    flag.set_value(FPropertyTagType::Bool(true)).unwrap();
    assert_eq!(flag.tag_data, Some(FPropertyTagData::Bool(true)));
}

#[test]
fn header_only_write_checks_declared_size() {
    let tag = FPropertyTag::new("Count", FPropertyTagType::Int(1)).unwrap();
    let err = tag.write(&mut writer(TAG_NAMES), false).unwrap_err();
    assert!(matches!(
        err,
        Error::SizeMismatch {
            declared: 0,
            actual: 4,
            ..
        }
    ));
}

#[test]
fn missing_names_fail_the_write() {
    let tag = FPropertyTag::new("Shield", FPropertyTagType::Int(1)).unwrap();
    let err = tag.write(&mut writer(TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::NameNotFound(name) if name == "Shield"));
}

#[test]
fn names_prefer_their_original_slot() {
    let names = ["None", "Count", "Count"];
    let mut ar = reader(&[2, 0, 0, 0], &names);
    let name = ar.read_fname().unwrap();
    assert_eq!(name.index(), Some(2));

    let mut out = writer(&names);
    crate::ArchiveWriter::write_fname(&mut out, &name).unwrap();
    crate::ArchiveWriter::write_fname(&mut out, &FName::new("Count")).unwrap();
    assert_eq!(out.into_inner().into_inner(), vec![2, 0, 0, 0, 1, 0, 0, 0]);
}

#[test]
fn strings_round_trip() {
    // empty, ASCII as ANSI, anything else as UTF-16
    for (value, len) in [("", 0), ("Trapwire", 9), ("Grüße", -6)] {
        let mut out = writer(&[]);
        crate::ArchiveWriter::write_fstring(&mut out, &FString::from(value)).unwrap();
        let data = out.into_inner().into_inner();
        assert_eq!(i32::from_le_bytes([data[0], data[1], data[2], data[3]]), len);
        assert_eq!(reader(&data, &[]).read_fstring().unwrap(), value);
    }
}

#[test]
fn strings_keep_their_stored_form() {
    let cases: [(&[u8], &str, bool); 4] = [
        // Latin-1
        (&[3, 0, 0, 0, b'h', 0xE9, 0], "h\u{e9}", false),
        // ASCII stored as UTF-16
        (&[0xFE, 0xFF, 0xFF, 0xFF, b'h', 0, 0, 0], "h", true),
        // terminator only
        (&[1, 0, 0, 0, 0], "", false),
        // bytes after the terminator
        (&[4, 0, 0, 0, b'a', 0, 7, 0], "a", false),
    ];
    for (data, text, wide) in cases {
        let string = reader(data, &[]).read_fstring().unwrap();
        assert_eq!(string, text);
        assert_eq!(string.is_wide(), wide);
        let mut out = writer(&[]);
        crate::ArchiveWriter::write_fstring(&mut out, &string).unwrap();
        assert_eq!(out.into_inner().into_inner(), data);
    }
}

#[test]
fn name_entries_keep_their_stored_form() {
    // "Mode" as UTF-16 followed by both hashes
    let mut data = vec![0xFB, 0xFF, 0xFF, 0xFF];
    for c in "Mode\0".encode_utf16() {
        data.write_u16::<LE>(c).unwrap();
    }
    data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    let entry = FNameEntry::read(&mut reader(&data, &[])).unwrap();
    assert_eq!(entry.name, "Mode");
    assert!(entry.name.is_wide());
    let mut out = writer(&[]);
    entry.write(&mut out).unwrap();
    assert_eq!(out.into_inner().into_inner(), data);
}

const PACKAGE_NAMES: &[&str] = &[
    "None",
    "/Script/CoreUObject",
    "/Script/ShooterGame",
    "Class",
    "CharacterUIData",
    "CharacterAbilityUIData",
    "Gumshoe_PrimaryAsset",
    "Gumshoe_Ability1",
    "DisplayName",
    "TextProperty",
    "Health",
    "IntProperty",
    "Abilities",
    "MapProperty",
    "EnumProperty",
    "ObjectProperty",
    "ECharacterAbilitySlot::Ability1",
    "ECharacterAbilitySlot::Ultimate",
    "WwiseStateName",
    "NameProperty",
    "State_Gumshoe",
];

fn class_import(package: &mut Package, class: &str) -> FPackageIndex {
    package.add_import(FObjectImport {
        class_package: "/Script/CoreUObject".into(),
        class_name: "Class".into(),
        outer_index: FPackageIndex::null(),
        object_name: class.into(),
    })
}

fn slot(name: &str) -> FPropertyTagType {
    FPropertyTagType::Enum(Some(FName::new(format!("ECharacterAbilitySlot::{name}"))))
}

/// A character UI export linking to one ability export, and optionally a
/// second slot pointing at `ultimate`.
fn character_package(ultimate: Option<FPackageIndex>) -> Package {
    let mut package = Package::new("Gumshoe_PrimaryAsset");
    for name in PACKAGE_NAMES {
        package.add_name(name);
    }
    let ui_class = class_import(&mut package, "CharacterUIData");
    let ability_class = class_import(&mut package, "CharacterAbilityUIData");

    let mut abilities = ScriptMap::new("EnumProperty", "ObjectProperty");
    abilities
        .insert(
            slot("Ability1"),
            FPropertyTagType::Object(FPackageIndex::from_export(1)),
        )
        .unwrap();
    if let Some(ultimate) = ultimate {
        abilities
            .insert(slot("Ultimate"), FPropertyTagType::Object(ultimate))
            .unwrap();
    }

    let mut ui = UObject::new("CharacterUIData");
    ui.properties
        .insert(FPropertyTag::new("Health", FPropertyTagType::Int(100)).unwrap());
    ui.properties.insert(
        FPropertyTag::new(
            "DisplayName",
            FPropertyTagType::Text(FText::new_base("Characters", "Gumshoe_Name", "Cypher")),
        )
        .unwrap(),
    );
    ui.properties.insert(
        FPropertyTag::new("WwiseStateName", FPropertyTagType::Name("State_Gumshoe".into()))
            .unwrap(),
    );
    ui.properties
        .insert(FPropertyTag::new("Abilities", FPropertyTagType::Map(abilities)).unwrap());
    package.push_export(
        FObjectExport::new("Gumshoe_PrimaryAsset".into(), ui_class),
        Box::new(ui),
    );

    let mut ability = UObject::new("CharacterAbilityUIData");
    ability.properties.insert(
        FPropertyTag::new(
            "DisplayName",
            FPropertyTagType::Text(FText::new_base("Abilities", "Trapwire_Name", "Trapwire")),
        )
        .unwrap(),
    );
    package.push_export(
        FObjectExport::new("Gumshoe_Ability1".into(), ability_class),
        Box::new(ability),
    );
    package
}

#[test]
fn package_round_trips() {
    let first = character_package(None).write().unwrap();
    let mut package =
        Package::read("Gumshoe_PrimaryAsset", &first.uasset, &first.uexp, None).unwrap();
    assert!(package.diagnostics().is_empty(), "{:?}", package.diagnostics());
    assert_eq!(package.exports().len(), 2);

    let second = package.write().unwrap();
    assert_eq!(first, second);

    let mut again =
        Package::read("Gumshoe_PrimaryAsset", &second.uasset, &second.uexp, None).unwrap();
    assert_eq!(again.write().unwrap(), second);
}

#[test]
fn header_offsets_match_layout() {
    let written = character_package(None).write().unwrap();
    assert_eq!(&written.uasset[..4], &[0xC1, 0x83, 0x2A, 0x9E]);
    assert_eq!(
        &written.uexp[written.uexp.len() - 4..],
        &PACKAGE_MAGIC.to_le_bytes()
    );

    let header = PackageHeader::read(&written.uasset).unwrap();
    let summary = &header.summary;
    assert_eq!(summary.total_header_size as usize, written.uasset.len());
    assert!(summary.name_offset < summary.import_offset);
    assert!(summary.import_offset < summary.export_offset);
    assert_eq!(header.tables.names.len(), PACKAGE_NAMES.len());
    assert_eq!(header.tables.imports.len(), 2);

    let mut next = summary.total_header_size as i64;
    for export in &header.tables.exports {
        assert_eq!(export.serial_offset, next);
        assert!(export.serial_size > 0);
        next += export.serial_size;
    }
    assert_eq!(
        (next - summary.total_header_size as i64) as usize,
        written.uexp.len() - 4
    );
}

#[test]
fn bad_magic_is_rejected() {
    let mut written = character_package(None).write().unwrap();
    written.uasset[0] = 0;
    let err = PackageHeader::read(&written.uasset).unwrap_err();
    assert_eq!(err.file, PackageFile::Uasset);
    assert!(matches!(
        err.error,
        Error::InvalidMagic {
            found: 0x9E2A_8300,
            ..
        }
    ));
    assert!(Package::read("broken", &written.uasset, &written.uexp, None).is_err());
}

#[test]
fn unversioned_packages_are_rejected() {
    let mut package = character_package(None);
    package.summary.package_flags |= PackageFlags::UNVERSIONED_PROPERTIES;
    let written = package.write().unwrap();
    let err = PackageHeader::read(&written.uasset).unwrap_err();
    assert!(matches!(err.error, Error::Format(_)));
}

#[test]
fn table_count_mismatch_fails_the_write() {
    let mut package = character_package(None);
    package.summary.name_count += 1;
    assert!(matches!(package.write(), Err(Error::Format(_))));
}

#[test]
fn character_ui_data_links_abilities() {
    let written = character_package(None).write().unwrap();
    let package =
        Package::read("Gumshoe_PrimaryAsset", &written.uasset, &written.uexp, None).unwrap();

    assert_eq!(package.export_type(0), Some("CharacterUIData"));
    assert_eq!(package.export_type(1), Some("CharacterAbilityUIData"));

    let ui = package.export_of_type::<CharacterUIData>().unwrap();
    assert_eq!(
        ui.abilities_with_index.get(&ECharacterAbilitySlot::Ability1),
        Some(&2)
    );
    assert_eq!(ui.abilities.get(&ECharacterAbilitySlot::Ability1), Some(&1));
    assert_eq!(ui.wwise_state_name.as_deref(), Some("State_Gumshoe"));
    assert_eq!(
        ui.display_name.as_ref().and_then(FText::text),
        Some("Cypher")
    );

    let ability = ui
        .ability(ECharacterAbilitySlot::Ability1, package.exports())
        .unwrap();
    assert_eq!(
        ability.display_name.as_ref().and_then(FText::text),
        Some("Trapwire")
    );
    assert_eq!(package.exports_of_type::<CharacterAbilityUIData>().count(), 1);
}

#[test]
fn unresolved_ability_links_are_reported() {
    // package index 1 is the character export itself
    let written = character_package(Some(FPackageIndex::from_export(0)))
        .write()
        .unwrap();
    let package =
        Package::read("Gumshoe_PrimaryAsset", &written.uasset, &written.uexp, None).unwrap();

    let ui = package.export_of_type::<CharacterUIData>().unwrap();
    assert_eq!(ui.abilities_with_index.len(), 2);
    assert_eq!(ui.abilities.len(), 1);
    assert!(!ui.abilities.contains_key(&ECharacterAbilitySlot::Ultimate));

    let unresolved: Vec<_> = package
        .diagnostics()
        .of_kind(DiagnosticKind::UnresolvedLink)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].path, "Gumshoe_PrimaryAsset");
}

#[test]
fn ability_slots_parse_with_or_without_prefix() {
    assert_eq!(
        ECharacterAbilitySlot::from_name("ECharacterAbilitySlot::Grenade"),
        Some(ECharacterAbilitySlot::Grenade)
    );
    assert_eq!(
        ECharacterAbilitySlot::from_name("Passive"),
        Some(ECharacterAbilitySlot::Passive)
    );
    assert_eq!(ECharacterAbilitySlot::from_name("Ability3"), None);
    assert_eq!(
        ECharacterAbilitySlot::Ultimate.to_string(),
        "ECharacterAbilitySlot::Ultimate"
    );
}

#[test]
fn edits_survive_a_write() {
    let written = character_package(None).write().unwrap();
    let mut package =
        Package::read("Gumshoe_PrimaryAsset", &written.uasset, &written.uexp, None).unwrap();

    package
        .export_mut(0)
        .unwrap()
        .properties_mut()
        .get_mut("Health")
        .unwrap()
        .set_value(FPropertyTagType::Int(150))
        .unwrap();
    let armor = package.add_name("Armor");
    package.exports_mut()[0]
        .properties_mut()
        .insert(FPropertyTag::new(armor, FPropertyTagType::Int(50)).unwrap());

    let edited = package.write().unwrap();
    let header = PackageHeader::read(&edited.uasset).unwrap();
    assert_eq!(header.summary.name_count as usize, PACKAGE_NAMES.len() + 1);
    assert_eq!(header.summary.total_header_size as usize, edited.uasset.len());

    let package =
        Package::read("Gumshoe_PrimaryAsset", &edited.uasset, &edited.uexp, None).unwrap();
    let properties: &Properties = package.exports()[0].properties();
    assert_eq!(
        properties.get_value("Health"),
        Some(&FPropertyTagType::Int(150))
    );
    assert_eq!(
        properties.get_value("Armor"),
        Some(&FPropertyTagType::Int(50))
    );
    assert!(package.diagnostics().is_empty());
}

#[test]
fn localization_changes_display_text_only() {
    let written = character_package(None).write().unwrap();
    let mut package =
        Package::read("Gumshoe_PrimaryAsset", &written.uasset, &written.uexp, None).unwrap();

    let mut localization = Localization::new();
    localization.insert("Characters", "Gumshoe_Name", "Cypher (fr)");
    package.apply_localization(&localization);

    let ui = package.export_of_type::<CharacterUIData>().unwrap();
    assert_eq!(
        ui.display_name.as_ref().and_then(FText::text),
        Some("Cypher (fr)")
    );
    assert_eq!(
        ui.base
            .properties
            .get_value("DisplayName")
            .and_then(FPropertyTagType::as_text)
            .and_then(FText::text),
        Some("Cypher (fr)")
    );
    let ability = package.export_of_type::<CharacterAbilityUIData>().unwrap();
    assert_eq!(
        ability.display_name.as_ref().and_then(FText::text),
        Some("Trapwire")
    );

    assert_eq!(package.write().unwrap(), written);
}

const BLUEPRINT_NAMES: &[&str] = &[
    "None",
    "/Script/CoreUObject",
    "/Script/Engine",
    "/Script/ShooterGame",
    "Class",
    "BlueprintGeneratedClass",
    "CharacterAbilityUIData",
    "Default__Trapwire_C",
    "Trapwire_C",
    "Health",
    "IntProperty",
];

fn blueprint_package(with_template: bool) -> Package {
    let mut package = Package::new("Trapwire");
    for name in BLUEPRINT_NAMES {
        package.add_name(name);
    }
    let generated = package.add_import(FObjectImport {
        class_package: "/Script/Engine".into(),
        class_name: "Class".into(),
        outer_index: FPackageIndex::null(),
        object_name: "BlueprintGeneratedClass".into(),
    });
    let template = package.add_import(FObjectImport {
        class_package: "/Script/ShooterGame".into(),
        class_name: "CharacterAbilityUIData".into(),
        outer_index: FPackageIndex::null(),
        object_name: "Default__Trapwire_C".into(),
    });

    let mut entry = FObjectExport::new("Trapwire_C".into(), generated);
    if with_template {
        entry.template_index = template;
    }
    let mut object = UObject::new("BlueprintGeneratedClass");
    object
        .properties
        .insert(FPropertyTag::new("Health", FPropertyTagType::Int(1)).unwrap());
    package.push_export(entry, Box::new(object));
    package
}

#[test]
fn generated_classes_dispatch_on_template_class() {
    let written = blueprint_package(true).write().unwrap();
    let package = Package::read("Trapwire", &written.uasset, &written.uexp, None).unwrap();
    assert_eq!(package.export_type(0), Some("CharacterAbilityUIData"));
    assert!(package.export_of_type::<CharacterAbilityUIData>().is_some());
    assert!(package.diagnostics().is_empty());
}

#[test]
fn generated_class_without_template_falls_back() {
    let written = blueprint_package(false).write().unwrap();
    let package = Package::read("Trapwire", &written.uasset, &written.uexp, None).unwrap();
    assert_eq!(package.export_type(0), Some("BlueprintGeneratedClass"));
    assert!(package.export_of_type::<UObject>().is_some());
    assert_eq!(
        package
            .diagnostics()
            .of_kind(DiagnosticKind::UnresolvedTypeReference)
            .count(),
        1
    );
}

#[derive(Debug)]
struct BulkTexture {
    base: UObject,
    bulk_len: Option<usize>,
}
impl Export for BulkTexture {
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
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn read_bulk_texture(
    ar: &mut AssetReader<'_>,
    context: &ExportContext<'_>,
) -> Result<Box<dyn Export>> {
    let bulk_len = ar.payload(PayloadType::Bulk).map(<[u8]>::len);
    Ok(Box::new(BulkTexture {
        base: UObject::read(ar, context)?,
        bulk_len,
    }))
}

fn read_nothing(
    _ar: &mut AssetReader<'_>,
    context: &ExportContext<'_>,
) -> Result<Box<dyn Export>> {
    Ok(Box::new(UObject::new(context.export_type)))
}

fn texture_package() -> Package {
    let mut package = Package::new("T_Icon");
    for name in [
        "None",
        "/Script/CoreUObject",
        "Class",
        "Texture2D",
        "T_Icon",
        "T_Icon2",
        "Health",
        "IntProperty",
    ] {
        package.add_name(name);
    }
    let class = class_import(&mut package, "Texture2D");
    for object_name in ["T_Icon", "T_Icon2"] {
        let mut texture = UObject::new("Texture2D");
        texture
            .properties
            .insert(FPropertyTag::new("Health", FPropertyTagType::Int(5)).unwrap());
        package.push_export(FObjectExport::new(object_name.into(), class), Box::new(texture));
    }
    package.set_bulk(Some(vec![1, 2, 3]));
    package
}

#[test]
fn custom_factories_see_bulk_payload() {
    let written = texture_package().write().unwrap();
    assert_eq!(written.ubulk, Some(vec![1, 2, 3]));

    let mut registry = ExportRegistry::with_builtins();
    registry.register("Texture2D", read_bulk_texture);
    let mut package = PackageReader::new()
        .registry(&registry)
        .read("T_Icon", &written.uasset, &written.uexp, written.ubulk.as_deref())
        .unwrap();
    let texture = package.export_of_type::<BulkTexture>().unwrap();
    assert_eq!(texture.bulk_len, Some(3));
    assert_eq!(package.bulk(), Some(&[1, 2, 3][..]));
    assert_eq!(package.write().unwrap(), written);

    let plain = Package::read("T_Icon", &written.uasset, &written.uexp, None).unwrap();
    assert_eq!(plain.exports_of_type::<UObject>().count(), 2);
    assert_eq!(plain.bulk(), None);
}

#[test]
fn short_reads_are_reported_and_skipped() {
    let written = texture_package().write().unwrap();
    let mut registry = ExportRegistry::new();
    registry.register("Texture2D", read_nothing);
    let package = PackageReader::new()
        .registry(&registry)
        .read("T_Icon", &written.uasset, &written.uexp, None)
        .unwrap();
    assert_eq!(package.exports().len(), 2);
    assert_eq!(
        package
            .diagnostics()
            .of_kind(DiagnosticKind::ExportSizeMismatch)
            .count(),
        2
    );
}

#[test]
fn trailing_export_bytes_are_preserved() {
    let mut package = texture_package();
    let texture = package.export_of_type_mut::<UObject>().unwrap();
    texture.extra = vec![0xAA, 0xBB, 0xCC];
    let written = package.write().unwrap();

    let mut package = Package::read(
        "T_Icon",
        &written.uasset,
        &written.uexp,
        written.ubulk.as_deref(),
    )
    .unwrap();
    let texture = package.export_of_type::<UObject>().unwrap();
    assert_eq!(texture.extra, vec![0xAA, 0xBB, 0xCC]);
    assert!(texture.guid_flag);
    assert_eq!(
        package
            .diagnostics()
            .of_kind(DiagnosticKind::TrailingBytes)
            .count(),
        1
    );
    assert_eq!(package.write().unwrap(), written);
}

#[test]
fn map_struct_values_use_type_hints() {
    let mut package = Package::new("Asset");
    for name in [
        "None",
        "/Script/CoreUObject",
        "Class",
        "Loadout",
        "Asset",
        "Points",
        "MapProperty",
        "NameProperty",
        "StructProperty",
        "Spawn",
    ] {
        package.add_name(name);
    }
    let class = class_import(&mut package, "Loadout");
    let mut points = ScriptMap::new("NameProperty", "StructProperty");
    points
        .insert(
            FPropertyTagType::Name("Spawn".into()),
            FPropertyTagType::Struct(
                ScriptStruct::new(
                    StructType::Vector,
                    StructValue::Vector(Vector {
                        x: 1.0,
                        y: 2.0,
                        z: 3.0,
                    }),
                )
                .unwrap(),
            ),
        )
        .unwrap();
    let mut object = UObject::new("Loadout");
    object
        .properties
        .insert(FPropertyTag::new("Points", FPropertyTagType::Map(points.clone())).unwrap());
    package.push_export(FObjectExport::new("Asset".into(), class), Box::new(object));
    let written = package.write().unwrap();

    let mut types = Types::new();
    types.add("Asset.Points.Value", StructType::Vector);
    let package = PackageReader::new()
        .types(types)
        .read("Asset", &written.uasset, &written.uexp, None)
        .unwrap();
    assert!(package.diagnostics().is_empty());
    assert_eq!(
        package.exports()[0].properties().get_value("Points"),
        Some(&FPropertyTagType::Map(points))
    );
}

#[test]
fn invariant_text_keeps_its_string() {
    let text = FText {
        flags: 2,
        history: crate::FTextHistory::None {
            culture_invariant: Some("N/A".into()),
        },
        localized: None,
    };
    let tag = FPropertyTag::new("Mode", FPropertyTagType::Text(text.clone())).unwrap();
    let names = ["None", "Mode", "TextProperty"];
    let encoded = encode_tag(&tag, &names);
    // flags, history, bool32, FString "N/A"
    assert_eq!(declared_size(&encoded), 4 + 1 + 4 + 8);
    let decoded = decode_tag(&encoded, &names);
    let decoded = decoded.value().and_then(FPropertyTagType::as_text).unwrap();
    assert_eq!(decoded, &text);
    assert_eq!(decoded.text(), Some("N/A"));
}

#[test]
fn repeated_properties_are_all_kept() {
    let mut data = vec![];
    // Count: IntProperty twice under the same array index
    for value in [1, 2] {
        for header in [9i32, 10, 4, 0] {
            data.write_i32::<LE>(header).unwrap();
        }
        data.write_u8(0).unwrap();
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_i32::<LE>(0).unwrap();
    assert_eq!(data.len(), 46);

    let mut ar = reader(&data, TAG_NAMES);
    let properties = read_properties_until_none(&mut ar).unwrap();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties.get_value("Count"), Some(&FPropertyTagType::Int(2)));
    assert_eq!(count(&ar, DiagnosticKind::DuplicateProperty), 1);

    let mut out = writer(TAG_NAMES);
    write_properties_none_terminated(&mut out, &properties).unwrap();
    assert_eq!(out.into_inner().into_inner(), data);
}

#[test]
fn stored_forms_survive_a_property_round_trip() {
    let mut data = vec![];
    // Title[0]: Latin-1 string
    for value in [26i32, 27, 7, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.extend_from_slice(&[3, 0, 0, 0, b'h', 0xE9, 0]);
    // Title[1]: ASCII stored as UTF-16
    for value in [26i32, 27, 8, 1] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.extend_from_slice(&[0xFE, 0xFF, 0xFF, 0xFF, b'h', 0, 0, 0]);
    // Count twice
    for value in [1, 2] {
        for header in [9i32, 10, 4, 0] {
            data.write_i32::<LE>(header).unwrap();
        }
        data.write_u8(0).unwrap();
        data.write_i32::<LE>(value).unwrap();
    }
    // Levels: ByteProperty to IntProperty with a key above 255
    for value in [24i32, 13, 16, 0, 25, 10] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    for value in [0u32, 1, 300, 3] {
        data.write_u32::<LE>(value).unwrap();
    }
    data.write_i32::<LE>(0).unwrap();

    let mut ar = reader(&data, TAG_NAMES);
    let properties = read_properties_until_none(&mut ar).unwrap();
    assert_eq!(ar.position().unwrap() as usize, data.len());
    assert_eq!(properties.len(), 5);
    assert_eq!(
        properties.get_value(("Title", 0)).and_then(FPropertyTagType::as_str),
        Some("h\u{e9}")
    );
    assert_eq!(
        properties.get_value(("Title", 1)).and_then(FPropertyTagType::as_str),
        Some("h")
    );
    let Some(FPropertyTagType::Map(levels)) = properties.get_value("Levels") else {
        panic!("Levels is not a map");
    };
    assert_eq!(
        levels.get(&FPropertyTagType::Byte(ByteValue::Wide(300))),
        Some(&FPropertyTagType::Int(3))
    );

    let mut out = writer(TAG_NAMES);
    write_properties_none_terminated(&mut out, &properties).unwrap();
    assert_eq!(out.into_inner().into_inner(), data);
}

#[test]
fn byte_properties_store_labels_only_for_named_enums() {
    let label = FPropertyTagType::Byte(ByteValue::Label("EMode::Fast".into()));
    let tag = FPropertyTag::new("Levels", label.clone()).unwrap();
    assert_eq!(tag.tag_data, Some(FPropertyTagData::Byte("EMode".into())));
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 4);
    assert_eq!(decode_tag(&encoded, TAG_NAMES).value(), Some(&label));

    let byte = FPropertyTagType::Byte(ByteValue::Byte(3));
    let tag = FPropertyTag::new("Levels", byte.clone()).unwrap();
    assert_eq!(tag.tag_data, Some(FPropertyTagData::Byte(FName::none())));
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 1);
    assert_eq!(encoded.last(), Some(&3));
    assert_eq!(decode_tag(&encoded, TAG_NAMES).value(), Some(&byte));
}

#[test]
fn enum_labels_must_agree_with_tag_data() {
    // labels without a `Type::` prefix leave no enum type to record
    assert!(matches!(
        FPropertyTag::new("Mode", FPropertyTagType::Enum(Some("Fast".into()))),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        FPropertyTag::new("Levels", FPropertyTagType::Byte(ByteValue::Label("Fast".into()))),
        Err(Error::TypeMismatch { .. })
    ));

    let mut empty = FPropertyTag::new("Mode", FPropertyTagType::Enum(None)).unwrap();
    assert!(matches!(
        empty.set_value(FPropertyTagType::Enum(Some("EMode::Fast".into()))),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(empty.value(), Some(&FPropertyTagType::Enum(None)));

    let mut mode =
        FPropertyTag::new("Mode", FPropertyTagType::Enum(Some("EMode::Fast".into()))).unwrap();
    assert!(matches!(
        mode.set_value(FPropertyTagType::Enum(None)),
        Err(Error::TypeMismatch { .. })
    ));
    *mode.value_mut().unwrap() = FPropertyTagType::Enum(None);
    let err = mode.write(&mut writer(TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::TypeMismatch { .. }));

    let mut level =
        FPropertyTag::new("Levels", FPropertyTagType::Byte(ByteValue::Byte(1))).unwrap();
    assert!(matches!(
        level.set_value(FPropertyTagType::Byte(ByteValue::Label("EMode::Fast".into()))),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn soft_object_map_values_are_padded() {
    let mut data = vec![];
    // Targets: NameProperty to SoftObjectProperty
    for value in [28i32, 13, 24, 0, 14, 29] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    // no removals, one entry: Alice to /Game/Maps/Range with an empty sub path
    for value in [0i32, 1, 15, 30, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.extend_from_slice(&[0xAA; 4]);

    let tag = decode_tag(&data, TAG_NAMES);
    let Some(FPropertyTagType::Map(targets)) = tag.value() else {
        panic!("Targets is not a map");
    };
    assert_eq!(
        targets.get(&FPropertyTagType::Name("Alice".into())),
        Some(&FPropertyTagType::SoftObject(FSoftObjectPath::new(
            "/Game/Maps/Range",
            ""
        )))
    );

    // the padding is skipped on read and written back as zeroes
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(encoded.len(), data.len());
    assert_eq!(&encoded[..data.len() - 4], &data[..data.len() - 4]);
    assert_eq!(&encoded[data.len() - 4..], &[0; 4]);
}

#[test]
fn delegates_hold_object_and_function() {
    let delegate = FScriptDelegate {
        object: FPackageIndex::from_export(0),
        function_name: "HandleHit".into(),
    };
    let tag = FPropertyTag::new("OnHit", FPropertyTagType::Delegate(delegate)).unwrap();
    assert_eq!(tag.tag_data, None);
    let encoded = encode_tag(&tag, TAG_NAMES);
    assert_eq!(declared_size(&encoded), 8);
    assert_eq!(&encoded[encoded.len() - 8..], &[1, 0, 0, 0, 33, 0, 0, 0]);
    assert_eq!(decode_tag(&encoded, TAG_NAMES).value(), tag.value());
}

#[test]
fn lazy_object_references_are_unsupported() {
    let mut data = vec![];
    for value in [34i32, 35, 16, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.extend_from_slice(&[0; 16]);

    let err = FPropertyTag::read(&mut reader(&data, TAG_NAMES), true).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        Error::UnsupportedPropertyKind(kind) if kind == "LazyObjectProperty"
    ));
}

#[test]
fn oversized_declarations_fail_without_allocating() {
    let mut data = vec![];
    // Mystery: MysteryProperty declaring far more bytes than remain
    for value in [20i32, 21, i32::MAX, 0] {
        data.write_i32::<LE>(value).unwrap();
    }
    data.write_u8(0).unwrap();
    data.extend_from_slice(&[1, 2, 3]);
    let err = FPropertyTag::read(&mut reader(&data, TAG_NAMES), true).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Io(_)));

    for len in [i32::MAX, i32::MIN] {
        let mut data = vec![];
        data.write_i32::<LE>(len).unwrap();
        data.extend_from_slice(b"abc");
        assert!(matches!(
            reader(&data, &[]).read_fstring(),
            Err(Error::Io(_))
        ));
    }
}

#[test]
fn short_guid_tail_stays_extra() {
    let tail = vec![1, 0, 0, 0, 7, 7, 7, 7, 7, 7, 7, 7];
    let mut package = texture_package();
    let texture = package.export_of_type_mut::<UObject>().unwrap();
    texture.guid_flag = false;
    texture.extra = tail.clone();
    let written = package.write().unwrap();

    let mut package = Package::read(
        "T_Icon",
        &written.uasset,
        &written.uexp,
        written.ubulk.as_deref(),
    )
    .unwrap();
    assert_eq!(
        package
            .diagnostics()
            .of_kind(DiagnosticKind::ExportSizeMismatch)
            .count(),
        0
    );
    let texture = package.export_of_type::<UObject>().unwrap();
    assert!(!texture.guid_flag);
    assert_eq!(texture.object_guid, None);
    assert_eq!(texture.extra, tail);
    assert_eq!(package.write().unwrap(), written);
}

#[test]
fn reading_twice_gives_the_same_package() {
    let written = character_package(None).write().unwrap();
    let read = || {
        Package::read("Gumshoe_PrimaryAsset", &written.uasset, &written.uexp, None).unwrap()
    };
    let (mut first, mut second) = (read(), read());
    assert_eq!(first.exports().len(), second.exports().len());
    for (a, b) in first.exports().iter().zip(second.exports()) {
        assert_eq!(a.export_type(), b.export_type());
        assert_eq!(a.properties(), b.properties());
    }
    let rewritten = first.write().unwrap();
    assert_eq!(rewritten, second.write().unwrap());
    assert_eq!(rewritten, written);
}

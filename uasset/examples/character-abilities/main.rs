use std::path::PathBuf;

use uasset::{CharacterUIData, ECharacterAbilitySlot::*, FText, Package};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "Gumshoe_PrimaryAsset".to_string()),
    );
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let uasset = std::fs::read(base.with_extension("uasset"))?;
    let uexp = std::fs::read(base.with_extension("uexp"))?;
    let ubulk = std::fs::read(base.with_extension("ubulk")).ok();
    let mut package = Package::read(name, &uasset, &uexp, ubulk.as_deref())?;

    for diagnostic in package.diagnostics() {
        eprintln!("{diagnostic}");
    }

    if let Some(ui) = package.export_of_type::<CharacterUIData>() {
        let text = |t: &Option<FText>| t.as_ref().and_then(FText::text).unwrap_or("").to_string();
        println!("{}: {}", text(&ui.display_name), text(&ui.description));
        for slot in [Ability1, Ability2, Grenade, Ultimate, Passive] {
            if let Some(ability) = ui.ability(slot, package.exports()) {
                println!(
                    "{slot}: {}",
                    ability.display_name.as_ref().and_then(FText::text).unwrap_or("")
                );
            }
        }
    }

    let written = package.write()?;
    println!(
        "round trip {}",
        if written.uasset == uasset && written.uexp == uexp {
            "identical"
        } else {
            "differs"
        }
    );
    Ok(())
}

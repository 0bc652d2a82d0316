//! Print the resolved definition of an exported card.

use std::path::Path;

use cardindex_core::card::{CardRef, internal_key_for};
use cardindex_core::types::FieldType;
use tabled::Tabled;

use super::common::indexed_realm;
use super::output::{print_json, print_table};
use crate::TypeOfArgs;

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Card")]
    card: String,
}

pub fn run(config: Option<&Path>, profile: Option<&str>, json: bool, args: TypeOfArgs) {
    let index = indexed_realm(config, profile);
    let card_ref = CardRef::exported(&args.module, &args.name);

    let Some(definition) = index.type_of(&card_ref) else {
        eprintln!("No definition for {}#{}", args.module, args.name);
        std::process::exit(1);
    };

    if json {
        print_json(&definition.to_document());
        return;
    }

    println!("{}", definition.key);
    match &definition.super_ref {
        Some(super_ref) => println!("extends {}", internal_key_for(super_ref, None)),
        None => println!("extends nothing"),
    }
    let rows: Vec<FieldRow> = definition
        .fields
        .iter()
        .map(|(name, field)| FieldRow {
            name: name.clone(),
            kind: match field.field_type {
                FieldType::Contains => "contains",
                FieldType::ContainsMany => "containsMany",
            },
            card: internal_key_for(&field.field_card, None),
        })
        .collect();
    print_table(&rows, "No fields.");
}

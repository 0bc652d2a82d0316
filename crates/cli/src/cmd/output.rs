//! Shared output formatting for query commands.

use cardindex_core::card::CardResource;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

/// Card row for table output.
#[derive(Debug, Serialize, Tabled)]
pub struct CardRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Adopts from")]
    pub adopts_from: String,
    #[tabled(rename = "Attributes")]
    pub attributes: String,
}

impl From<&CardResource> for CardRow {
    fn from(resource: &CardResource) -> Self {
        let adopts = &resource.meta.adopts_from;
        Self {
            id: resource.id.clone().unwrap_or_default(),
            adopts_from: format!("{}#{}", adopts.module, adopts.name),
            attributes: truncate(&Value::Object(resource.attributes.clone()).to_string(), 60),
        }
    }
}

pub fn print_table<T: Tabled>(rows: &[T], empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Truncate a string to `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

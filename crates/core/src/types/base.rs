//! The base realm: the root card and the primitive field cards.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use url::Url;

use super::definition::CardDefinition;
use crate::card::CardRef;

pub const BASE_REALM_URL: &str = "https://cardstack.com/base/";

/// Module exporting the root `Card`, the `field` decorator and the
/// `contains` / `containsMany` field kinds.
pub const CARD_API_MODULE: &str = "https://cardstack.com/base/card-api";

pub static BASE_REALM: LazyLock<Url> = LazyLock::new(|| Url::parse(BASE_REALM_URL).unwrap());

pub fn root_card_ref() -> CardRef {
    CardRef::exported(CARD_API_MODULE, "Card")
}

/// Primitive field cards, each the default export of its own module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    Datetime,
}

impl Primitive {
    pub const ALL: [Primitive; 5] = [
        Primitive::String,
        Primitive::Number,
        Primitive::Boolean,
        Primitive::Date,
        Primitive::Datetime,
    ];

    pub fn module(self) -> String {
        let name = match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Date => "date",
            Primitive::Datetime => "datetime",
        };
        format!("{BASE_REALM_URL}{name}")
    }

    pub fn card_ref(self) -> CardRef {
        CardRef::exported(self.module(), "default")
    }

    pub fn from_card_ref(card_ref: &CardRef) -> Option<Primitive> {
        let CardRef::ExportedCard { module, name } = card_ref else {
            return None;
        };
        if name != "default" {
            return None;
        }
        Primitive::ALL.into_iter().find(|p| p.module() == *module)
    }

    /// Normalize a query value the way instances of this card store it.
    pub fn format_query_value(self, value: &Value) -> Value {
        match (self, value) {
            (Primitive::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or_else(|| value.clone(), Value::Number),
            (Primitive::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value.clone(),
            },
            (Primitive::Date, Value::String(s)) => format_date(s).map_or_else(|| value.clone(), Value::String),
            (Primitive::Datetime, Value::String(s)) => {
                format_datetime(s).map_or_else(|| value.clone(), Value::String)
            }
            _ => value.clone(),
        }
    }
}

fn format_date(s: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn format_datetime(s: &str) -> Option<String> {
    let datetime = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
    Some(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Query value formatting for any field card; non-primitive cards leave the
/// value untouched.
pub fn format_query_value(field_card: &CardRef, value: &Value) -> Value {
    match Primitive::from_card_ref(field_card) {
        Some(primitive) => primitive.format_query_value(value),
        None => value.clone(),
    }
}

/// Definitions every index starts from.
pub fn base_definitions() -> Vec<CardDefinition> {
    let mut definitions = vec![CardDefinition::new(root_card_ref(), None)];
    for primitive in Primitive::ALL {
        definitions.push(CardDefinition::new(primitive.card_ref(), Some(root_card_ref())));
    }
    definitions
}

/// Whether `module`/`name` is the card-api export `export`.
pub fn is_card_api_export(module: &Url, name: &str, export: &str) -> bool {
    module.as_str() == CARD_API_MODULE && name == export
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_lookup() {
        let string = CardRef::exported("https://cardstack.com/base/string", "default");
        assert_eq!(Primitive::from_card_ref(&string), Some(Primitive::String));
        assert_eq!(Primitive::from_card_ref(&root_card_ref()), None);
    }

    #[test]
    fn test_format_query_values() {
        let number = Primitive::Number.card_ref();
        assert_eq!(format_query_value(&number, &json!("12")), json!(12.0));
        assert_eq!(format_query_value(&number, &json!(3)), json!(3));

        let boolean = Primitive::Boolean.card_ref();
        assert_eq!(format_query_value(&boolean, &json!("true")), json!(true));

        let date = Primitive::Date.card_ref();
        assert_eq!(format_query_value(&date, &json!("2022-03-04T10:00:00Z")), json!("2022-03-04"));

        let datetime = Primitive::Datetime.card_ref();
        assert_eq!(
            format_query_value(&datetime, &json!("2022-03-04T10:00:00+02:00")),
            json!("2022-03-04T08:00:00.000Z")
        );

        let other = CardRef::exported("http://test/pet", "Pet");
        assert_eq!(format_query_value(&other, &json!("12")), json!("12"));
    }

    #[test]
    fn test_base_definitions() {
        let definitions = base_definitions();
        assert_eq!(definitions.len(), 6);
        assert!(definitions[0].super_ref.is_none());
        assert!(definitions[1..].iter().all(|d| d.super_ref == Some(root_card_ref())));
    }
}

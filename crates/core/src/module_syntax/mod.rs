//! Card module analysis.
//!
//! A module is scanned for its imports, the classes it declares, what each
//! class extends, which classes are exported and under what name, and the
//! `@field name = contains(Type)` declarations inside class bodies.

mod parser;

use thiserror::Error;
use url::Url;

use crate::realm::resolve_module;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleSyntaxError {
    #[error("line {line}: '{name}' is neither declared in this module nor imported")]
    UnknownIdentifier { name: String, line: usize },

    #[error("line {line}: class '{name}' has no closing brace")]
    UnterminatedClass { name: String, line: usize },
}

/// Where a class-valued identifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassReference {
    /// Another class in the same module, by index into `possible_cards`.
    Internal { class_index: usize },
    /// A named import; `module` is the specifier as written.
    External { module: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub local: String,
    /// Exported name in the source module, `default` for default imports.
    pub imported: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleField {
    pub decorator: Option<ClassReference>,
    pub field_type: Option<ClassReference>,
    pub card: ClassReference,
}

/// A class declaration that may turn out to be a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PossibleCard {
    pub local_name: String,
    pub exported_as: Option<String>,
    /// `None` for classes without an `extends` clause.
    pub super_ref: Option<ClassReference>,
    pub fields: Vec<(String, PossibleField)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    pub imports: Vec<Import>,
    pub possible_cards: Vec<PossibleCard>,
}

impl ModuleSyntax {
    pub fn parse(source: &str) -> Result<Self, ModuleSyntaxError> {
        parser::parse(source)
    }

    /// Index of the class exported under `name`.
    pub fn exported(&self, name: &str) -> Option<usize> {
        self.possible_cards.iter().position(|c| c.exported_as.as_deref() == Some(name))
    }

    /// Modules this module imports, resolved against its own URL where
    /// possible and deduplicated in import order.
    pub fn consumes(&self, module_url: &Url) -> Vec<String> {
        let mut consumes: Vec<String> = Vec::new();
        for import in &self.imports {
            let href = resolve_module(&import.source, module_url)
                .map(|url| url.to_string())
                .unwrap_or_else(|| import.source.clone());
            if !consumes.contains(&href) {
                consumes.push(href);
            }
        }
        consumes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PET: &str = r#"
import { contains, field, Card } from 'https://cardstack.com/base/card-api';
import StringCard from 'https://cardstack.com/base/string';

/* the base pet
   card */
export class Pet extends Card {
  @field firstName = contains(StringCard);
  static isolated = class Isolated extends Component<typeof this> {
    <template>{{@model.firstName}}</template>
  }
}
"#;

    const DOG: &str = r#"
import { contains, field } from 'https://cardstack.com/base/card-api';
import NumberCard from 'https://cardstack.com/base/number';
import { Pet } from './pet';

class Internal extends Pet {
  // @field commented = contains(Nope);
  @field age = contains(NumberCard);
}

export default class Dog extends Internal {}
export { Internal as Hidden };
"#;

    #[test]
    fn test_parses_imports() {
        let syntax = ModuleSyntax::parse(PET).unwrap();
        assert_eq!(syntax.imports.len(), 4);
        assert_eq!(syntax.imports[2].local, "Card");
        assert_eq!(syntax.imports[3].imported, "default");
        assert_eq!(syntax.imports[3].local, "StringCard");
    }

    #[test]
    fn test_parses_exported_card_with_fields() {
        let syntax = ModuleSyntax::parse(PET).unwrap();
        assert_eq!(syntax.possible_cards.len(), 1);

        let pet = &syntax.possible_cards[0];
        assert_eq!(pet.exported_as.as_deref(), Some("Pet"));
        assert_eq!(
            pet.super_ref,
            Some(ClassReference::External {
                module: "https://cardstack.com/base/card-api".into(),
                name: "Card".into(),
            })
        );
        assert_eq!(pet.fields.len(), 1);
        let (name, field) = &pet.fields[0];
        assert_eq!(name, "firstName");
        assert_eq!(
            field.card,
            ClassReference::External {
                module: "https://cardstack.com/base/string".into(),
                name: "default".into(),
            }
        );
        assert!(field.decorator.is_some());
    }

    #[test]
    fn test_internal_superclass_and_export_forms() {
        let syntax = ModuleSyntax::parse(DOG).unwrap();
        assert_eq!(syntax.possible_cards.len(), 2);

        let internal = &syntax.possible_cards[0];
        assert_eq!(internal.exported_as.as_deref(), Some("Hidden"));
        assert_eq!(internal.fields.len(), 1);

        let dog = &syntax.possible_cards[1];
        assert_eq!(dog.exported_as.as_deref(), Some("default"));
        assert_eq!(dog.super_ref, Some(ClassReference::Internal { class_index: 0 }));
        assert_eq!(syntax.exported("default"), Some(1));
    }

    #[test]
    fn test_unknown_superclass_is_an_error() {
        let err = ModuleSyntax::parse("export class Broken extends Missing {}\n").unwrap_err();
        assert_eq!(err, ModuleSyntaxError::UnknownIdentifier { name: "Missing".into(), line: 1 });
    }

    #[test]
    fn test_unterminated_class() {
        let err = ModuleSyntax::parse("class Open {\n").unwrap_err();
        assert!(matches!(err, ModuleSyntaxError::UnterminatedClass { .. }));
    }

    #[test]
    fn test_consumes() {
        let syntax = ModuleSyntax::parse(DOG).unwrap();
        let url = Url::parse("http://test/realm/dog.gts").unwrap();
        assert_eq!(
            syntax.consumes(&url),
            vec![
                "https://cardstack.com/base/card-api".to_string(),
                "https://cardstack.com/base/number".to_string(),
                "http://test/realm/pet".to_string(),
            ]
        );
    }
}

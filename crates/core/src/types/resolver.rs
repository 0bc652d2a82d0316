//! Builds the definition graph for one indexing run.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use url::Url;

use super::base::{self, CARD_API_MODULE};
use super::definition::{CardDefinition, Definitions, FieldDefinition, FieldType};
use super::errors::DefinitionError;
use super::external::RemoteTypes;
use crate::card::{CardRef, internal_key_for};
use crate::index::ModuleWithErrors;
use crate::module_syntax::{ClassReference, ModuleSyntax};
use crate::realm::{RealmPaths, has_executable_extension, resolve_module};

/// Result of resolving every exported card of a realm.
#[derive(Debug, Default)]
pub struct DefinitionBuild {
    pub definitions: Definitions,
    /// Cards that could not be defined, by internal key.
    pub errors: Vec<(String, DefinitionError)>,
}

pub struct DefinitionResolver<'a> {
    paths: &'a RealmPaths,
    modules: &'a BTreeMap<String, ModuleWithErrors>,
    remote: RemoteTypes<'a>,
    definitions: Definitions,
    in_progress: HashSet<String>,
    errors: Vec<(String, DefinitionError)>,
}

impl<'a> DefinitionResolver<'a> {
    pub fn new(
        paths: &'a RealmPaths,
        modules: &'a BTreeMap<String, ModuleWithErrors>,
        remote: RemoteTypes<'a>,
    ) -> Self {
        let mut definitions = Definitions::default();
        for definition in base::base_definitions() {
            definitions.insert(Arc::new(definition));
        }
        Self {
            paths,
            modules,
            remote,
            definitions,
            in_progress: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Define every exported card of every analyzed module.
    pub fn build(mut self) -> DefinitionBuild {
        let modules: Vec<(Url, Arc<ModuleSyntax>)> = self
            .modules
            .iter()
            .filter(|(href, _)| !has_executable_extension(href))
            .filter_map(|(href, module)| match module {
                ModuleWithErrors::Module(module) => {
                    Url::parse(href).ok().map(|url| (url, module.syntax.clone()))
                }
                ModuleWithErrors::Error { .. } => None,
            })
            .collect();

        for (url, syntax) in modules {
            for (index, card) in syntax.possible_cards.iter().enumerate() {
                let Some(name) = &card.exported_as else { continue };
                if card.super_ref.is_none() {
                    continue;
                }
                let requested = CardRef::exported(url.as_str(), name);
                if let Err(e) = self.build_definition(&url, &syntax, requested.clone(), index) {
                    let key = internal_key_for(&requested, None);
                    tracing::warn!(card = %key, error = %e, "skipping card definition");
                    self.errors.push((key, e));
                }
            }
        }

        DefinitionBuild { definitions: self.definitions, errors: self.errors }
    }

    fn build_definition(
        &mut self,
        module_url: &Url,
        syntax: &Arc<ModuleSyntax>,
        requested: CardRef,
        index: usize,
    ) -> Result<Arc<CardDefinition>, DefinitionError> {
        let card = &syntax.possible_cards[index];
        let id = match &card.exported_as {
            Some(name) => CardRef::exported(module_url.as_str(), name),
            None => requested.clone(),
        };
        let id_key = internal_key_for(&id, None);
        let requested_key = internal_key_for(&requested, None);

        if let Some(definition) = self.definitions.get(&id_key).cloned() {
            if requested_key != id_key {
                self.definitions.alias(requested_key, definition.clone());
            }
            return Ok(definition);
        }
        if !self.in_progress.insert(id_key.clone()) {
            return Err(DefinitionError::Circular(id_key));
        }
        let result = self.define(module_url, syntax, id, index);
        self.in_progress.remove(&id_key);

        let definition = Arc::new(result?);
        self.definitions.insert(definition.clone());
        if requested_key != id_key {
            self.definitions.alias(requested_key, definition.clone());
        }
        Ok(definition)
    }

    fn define(
        &mut self,
        module_url: &Url,
        syntax: &Arc<ModuleSyntax>,
        id: CardRef,
        index: usize,
    ) -> Result<CardDefinition, DefinitionError> {
        let card = &syntax.possible_cards[index];
        let Some(super_ref) = &card.super_ref else {
            return Err(DefinitionError::NotACard {
                module: module_url.to_string(),
                name: card.local_name.clone(),
            });
        };

        let parent = self.resolve_class(module_url, syntax, super_ref, CardRef::ancestor_of(id.clone()))?;
        let mut definition = CardDefinition::new(id.clone(), Some(parent.id.clone()));
        definition.fields = parent.fields.clone();

        for (name, field) in &card.fields {
            if !self.is_card_api(module_url, field.decorator.as_ref(), "field") {
                continue;
            }
            let field_type = if self.is_card_api(module_url, field.field_type.as_ref(), "contains") {
                FieldType::Contains
            } else if self.is_card_api(module_url, field.field_type.as_ref(), "containsMany") {
                FieldType::ContainsMany
            } else {
                continue;
            };

            let target = CardRef::field_of(id.clone(), name);
            match self.resolve_class(module_url, syntax, &field.card, target) {
                Ok(field_card) => {
                    definition.fields.insert(
                        name.clone(),
                        FieldDefinition { field_type, field_card: field_card.id.clone() },
                    );
                }
                Err(e) => {
                    let key = internal_key_for(&definition.id, None);
                    tracing::warn!(card = %key, field = %name, error = %e, "skipping field");
                    self.errors.push((format!("{key}/fields/{name}"), e));
                }
            }
        }

        Ok(definition)
    }

    /// Definition of the class a reference points at, built on demand.
    fn resolve_class(
        &mut self,
        module_url: &Url,
        syntax: &Arc<ModuleSyntax>,
        class_ref: &ClassReference,
        target: CardRef,
    ) -> Result<Arc<CardDefinition>, DefinitionError> {
        match class_ref {
            ClassReference::Internal { class_index } => {
                self.build_definition(module_url, syntax, target, *class_index)
            }
            ClassReference::External { module, name } => {
                let resolved = resolve_module(module, module_url)
                    .ok_or_else(|| DefinitionError::UnresolvableModule(module.clone()))?;

                if resolved.as_str() == CARD_API_MODULE && name == "Card" {
                    let root = self.definitions.get_ref(&base::root_card_ref()).cloned();
                    return root.ok_or_else(|| DefinitionError::MissingModule(CARD_API_MODULE.into()));
                }

                if self.paths.in_realm(&resolved) {
                    let inner = self.local_module(&resolved)?;
                    let index = inner.exported(name).ok_or_else(|| DefinitionError::MissingExport {
                        module: resolved.to_string(),
                        name: name.clone(),
                    })?;
                    self.build_definition(&resolved, &inner, target, index)
                } else {
                    self.remote.definition(&resolved, name, &mut self.definitions)
                }
            }
        }
    }

    fn local_module(&self, url: &Url) -> Result<Arc<ModuleSyntax>, DefinitionError> {
        match self.modules.get(url.as_str()) {
            Some(ModuleWithErrors::Module(module)) => Ok(module.syntax.clone()),
            Some(ModuleWithErrors::Error { error, .. }) => Err(DefinitionError::BrokenModule {
                module: url.to_string(),
                message: error.message.clone(),
            }),
            None => Err(DefinitionError::MissingModule(url.to_string())),
        }
    }

    /// Whether a class reference names the card-api export `export`.
    fn is_card_api(&self, module_url: &Url, class_ref: Option<&ClassReference>, export: &str) -> bool {
        match class_ref {
            Some(ClassReference::External { module, name }) => resolve_module(module, module_url)
                .is_some_and(|url| base::is_card_api_export(&url, name, export)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::index::Module;
    use crate::loader::RealmLoader;
    use crate::types::TypeCache;

    const REALM: &str = "http://test/realm/";

    const PET: &str = r#"
import { contains, field, Card } from 'https://cardstack.com/base/card-api';
import StringCard from 'https://cardstack.com/base/string';

class Pet extends Card {
  @field firstName = contains(StringCard);
}
export { Pet as Animal };
"#;

    fn build(files: &[(&str, &str)]) -> DefinitionBuild {
        let paths = RealmPaths::parse(REALM).unwrap();
        let mut modules = BTreeMap::new();
        for (path, source) in files {
            let url = paths.url().join(path).unwrap();
            let syntax = ModuleSyntax::parse(source).unwrap();
            let module = Module {
                url: url.to_string(),
                consumes: syntax.consumes(&url),
                syntax: Arc::new(syntax),
            };
            modules.insert(url.to_string(), ModuleWithErrors::Module(module));
        }
        let loader = RealmLoader::new();
        let cache = TypeCache::new();
        let realms: Vec<Url> = Vec::new();
        let remote = RemoteTypes::new(&loader, &cache, &realms);
        DefinitionResolver::new(&paths, &modules, remote).build()
    }

    fn key(path: &str) -> String {
        format!("{REALM}{path}")
    }

    #[test]
    fn test_circular_ancestry_defines_nothing() {
        let build = build(&[
            ("a", "import { B } from './b';\nexport class A extends B {}\n"),
            ("b", "import { A } from './a';\nexport class B extends A {}\n"),
        ]);

        assert_eq!(build.errors.len(), 2);
        assert!(build.errors.iter().all(|(_, e)| matches!(e, DefinitionError::Circular(_))));
        assert!(build.definitions.get(&key("a/A")).is_none());
        assert!(build.definitions.get(&key("b/B")).is_none());
        assert_eq!(build.definitions.len(), base::base_definitions().len());
    }

    #[rstest]
    #[case("import { Nope } from './pet';\nexport class Stray extends Nope {}\n", "MissingExport")]
    #[case("import { Pet } from './gone';\nexport class Stray extends Pet {}\n", "MissingModule")]
    fn test_unresolvable_super_is_not_the_root(#[case] stray: &str, #[case] expected: &str) {
        let build = build(&[("pet", PET), ("stray", stray)]);

        let (card, error) = &build.errors[0];
        assert_eq!(card, &key("stray/Stray"));
        match (expected, error) {
            ("MissingExport", DefinitionError::MissingExport { name, .. }) => assert_eq!(name, "Nope"),
            ("MissingModule", DefinitionError::MissingModule(module)) => assert_eq!(module, &key("gone")),
            _ => panic!("unexpected error {error:?}"),
        }
        assert!(build.definitions.get(&key("stray/Stray")).is_none());
        assert!(build.definitions.types_of(&key("stray/Stray")).is_none());
    }

    #[test]
    fn test_aliased_and_default_exports_share_one_definition() {
        let build = build(&[
            ("pet", PET),
            ("cat", "import { Animal } from './pet';\nexport class Cat extends Animal {}\n"),
            ("dog", "import { Animal } from './pet';\nexport default class Dog extends Animal {}\n"),
        ]);
        assert!(build.errors.is_empty(), "{:?}", build.errors);
        let definitions = &build.definitions;

        let animal = definitions.get(&key("pet/Animal")).expect("Pet is defined under its export name");
        assert!(animal.fields.contains_key("firstName"));
        assert!(definitions.get(&key("pet/Pet")).is_none());

        let dog = definitions.get(&key("dog/default")).expect("default export is defined");
        assert_eq!(dog.super_ref, Some(CardRef::exported(key("pet"), "Animal")));
        assert!(dog.fields.contains_key("firstName"));

        let via_cat = definitions.get(&key("cat/Cat/ancestor")).unwrap();
        let via_dog = definitions.get(&key("dog/default/ancestor")).unwrap();
        assert!(Arc::ptr_eq(via_cat, animal));
        assert!(Arc::ptr_eq(via_dog, animal));
        assert_eq!(
            definitions.types_of(&key("dog/default")).unwrap(),
            vec![key("dog/default"), key("pet/Animal"), internal_key_for(&base::root_card_ref(), None)]
        );
    }
}

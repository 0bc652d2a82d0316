#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub const REALM: &str = "http://test/realm/";

const PET: &str = r#"
import { contains, field, Card } from 'https://cardstack.com/base/card-api';
import StringCard from 'https://cardstack.com/base/string';

export class Pet extends Card {
  @field firstName = contains(StringCard);
}
"#;

const DOG: &str = r#"
import { contains, field } from 'https://cardstack.com/base/card-api';
import NumberCard from 'https://cardstack.com/base/number';
import { Pet } from './pet';

export class Dog extends Pet {
  @field age = contains(NumberCard);
}
"#;

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn instance(module: &str, name: &str, attributes: serde_json::Value) -> String {
    serde_json::json!({
        "data": {
            "type": "card",
            "attributes": attributes,
            "meta": { "adoptsFrom": { "module": module, "name": name } }
        }
    })
    .to_string()
}

/// A realm on disk with a config pointing at it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl Fixture {
    pub fn new(extra_toml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("realm");
        write_file(&root.join("pet.gts"), PET);
        write_file(&root.join("dog.gts"), DOG);
        write_file(
            &root.join("mango.json"),
            &instance("./pet", "Pet", serde_json::json!({ "firstName": "Mango" })),
        );
        write_file(
            &root.join("dogs/rex.json"),
            &instance("../dog", "Dog", serde_json::json!({ "firstName": "Rex", "age": 3 })),
        );
        write_file(
            &root.join("dogs/fido.json"),
            &instance("../dog", "Dog", serde_json::json!({ "firstName": "Fido", "age": 7 })),
        );
        write_file(&root.join("broken.json"), &instance("./nowhere", "Ghost", serde_json::json!({})));
        write_file(&root.join(".gitignore"), "drafts/\n");
        write_file(&root.join("drafts/wip.json"), &instance("./pet", "Pet", serde_json::json!({})));

        let config = dir.path().join("config.toml");
        let toml = format!(
            r#"
version = 1
profile = "default"

[profiles.default]
realm_url = "{REALM}"
realm_root = "{}"
{extra_toml}
"#,
            root.display()
        );
        write_file(&config, &toml);
        Self { dir, config }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("realm")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cardx"));
        cmd.env("RUST_LOG", "warn");
        cmd.arg("--config").arg(&self.config);
        cmd
    }
}

//! Regex-driven scanner for card module source.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ClassReference, Import, ModuleSyntax, ModuleSyntaxError, PossibleCard, PossibleField};

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*//.*$").unwrap());

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    // import Default, { a, b as c } from 'source'
    Regex::new(
        r#"(?m)^[ \t]*import\s+(?:([A-Za-z_$][\w$]*)\s*,?\s*)?(?:\{([^}]*)\})?\s*from\s*['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(export\s+(default\s+)?)?class\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([A-Za-z_$][\w$]*))?[^{;]*\{",
    )
    .unwrap()
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    // @field name = contains(Type)
    Regex::new(
        r"@([A-Za-z_$][\w$]*)\s+([A-Za-z_$][\w$]*)\s*=\s*([A-Za-z_$][\w$]*)\s*\(\s*([A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

static EXPORT_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s*\{([^}]*)\}(\s*from\b)?").unwrap());

static EXPORT_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+default\s+([A-Za-z_$][\w$]*)\s*;?[ \t]*$").unwrap()
});

/// A class declaration found in the source.
struct ClassDecl {
    name: String,
    exported_as: Option<String>,
    super_ident: Option<String>,
    body_start: usize,
    body_end: usize,
    line: usize,
}

pub(super) fn parse(source: &str) -> Result<ModuleSyntax, ModuleSyntaxError> {
    let source = strip_comments(source);
    let imports = parse_imports(&source);
    let mut classes = parse_classes(&source)?;
    apply_export_lists(&source, &mut classes);

    let class_index: HashMap<&str, usize> =
        classes.iter().enumerate().map(|(i, c)| (c.name.as_str(), i)).collect();
    let resolve = |ident: &str| -> Option<ClassReference> {
        if let Some(&class_index) = class_index.get(ident) {
            return Some(ClassReference::Internal { class_index });
        }
        imports.iter().find(|i| i.local == ident).map(|i| ClassReference::External {
            module: i.source.clone(),
            name: i.imported.clone(),
        })
    };

    let mut possible_cards = Vec::with_capacity(classes.len());
    for class in &classes {
        let super_ref = match &class.super_ident {
            Some(ident) => Some(resolve(ident).ok_or_else(|| {
                ModuleSyntaxError::UnknownIdentifier { name: ident.clone(), line: class.line }
            })?),
            None => None,
        };

        let body = &source[class.body_start..class.body_end];
        let mut fields = Vec::new();
        for caps in FIELD_RE.captures_iter(body) {
            let line = line_of(&source, class.body_start + caps.get(0).map_or(0, |m| m.start()));
            let card_ident = &caps[4];
            let card = resolve(card_ident).ok_or_else(|| ModuleSyntaxError::UnknownIdentifier {
                name: card_ident.to_string(),
                line,
            })?;
            fields.push((
                caps[2].to_string(),
                PossibleField {
                    decorator: resolve(&caps[1]),
                    field_type: resolve(&caps[3]),
                    card,
                },
            ));
        }

        possible_cards.push(PossibleCard {
            local_name: class.name.clone(),
            exported_as: class.exported_as.clone(),
            super_ref,
            fields,
        });
    }

    Ok(ModuleSyntax { imports, possible_cards })
}

/// Blank out comments, keeping newlines so line numbers stay accurate.
fn strip_comments(source: &str) -> String {
    let keep_newlines = |caps: &Captures| -> String {
        caps[0].chars().filter(|c| *c == '\n').collect()
    };
    let source = BLOCK_COMMENT_RE.replace_all(source, keep_newlines);
    LINE_COMMENT_RE.replace_all(&source, "").into_owned()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn parse_imports(source: &str) -> Vec<Import> {
    let mut imports = Vec::new();
    for caps in IMPORT_RE.captures_iter(source) {
        let source_module = caps[3].to_string();
        if let Some(default) = caps.get(1)
            && default.as_str() != "type"
        {
            imports.push(Import {
                local: default.as_str().to_string(),
                imported: "default".to_string(),
                source: source_module.clone(),
            });
        }
        if let Some(named) = caps.get(2) {
            for spec in named.as_str().split(',') {
                let spec = spec.trim().trim_start_matches("type ").trim();
                if spec.is_empty() {
                    continue;
                }
                let (imported, local) = match spec.split_once(" as ") {
                    Some((imported, local)) => (imported.trim(), local.trim()),
                    None => (spec, spec),
                };
                imports.push(Import {
                    local: local.to_string(),
                    imported: imported.to_string(),
                    source: source_module.clone(),
                });
            }
        }
    }
    imports
}

fn parse_classes(source: &str) -> Result<Vec<ClassDecl>, ModuleSyntaxError> {
    let mut classes: Vec<ClassDecl> = Vec::new();
    for caps in CLASS_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        if classes.iter().any(|c| whole.start() >= c.body_start && whole.start() < c.body_end) {
            // nested declaration, scanned as part of the enclosing body
            continue;
        }

        let name = caps[3].to_string();
        let line = line_of(source, whole.start());
        let body_start = whole.end();
        let body_end = matching_brace(source, body_start)
            .ok_or_else(|| ModuleSyntaxError::UnterminatedClass { name: name.clone(), line })?;

        let exported_as = match (caps.get(1), caps.get(2)) {
            (Some(_), Some(_)) => Some("default".to_string()),
            (Some(_), None) => Some(name.clone()),
            _ => None,
        };

        classes.push(ClassDecl {
            name,
            exported_as,
            super_ident: caps.get(4).map(|m| m.as_str().to_string()),
            body_start,
            body_end,
            line,
        });
    }
    Ok(classes)
}

/// Offset of the `}` closing a block whose `{` ends just before `start`.
fn matching_brace(source: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, byte) in source.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn apply_export_lists(source: &str, classes: &mut [ClassDecl]) {
    for caps in EXPORT_LIST_RE.captures_iter(source) {
        if caps.get(2).is_some() {
            // re-export from another module
            continue;
        }
        for spec in caps[1].split(',') {
            let spec = spec.trim();
            if spec.is_empty() {
                continue;
            }
            let (local, exported) = match spec.split_once(" as ") {
                Some((local, exported)) => (local.trim(), exported.trim()),
                None => (spec, spec),
            };
            if let Some(class) = classes.iter_mut().find(|c| c.name == local) {
                class.exported_as = Some(exported.to_string());
            }
        }
    }

    for caps in EXPORT_DEFAULT_RE.captures_iter(source) {
        let local = &caps[1];
        if let Some(class) = classes.iter_mut().find(|c| c.name == local) {
            class.exported_as = Some("default".to_string());
        }
    }
}

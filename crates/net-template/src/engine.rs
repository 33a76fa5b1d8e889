//! Template store and renderer

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use netprov_core::{CommandSet, Dialect, TemplateError};

use crate::syntax::{parse, Node};

const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    ("loopback", include_str!("../templates/loopback.j2")),
    ("Base", include_str!("../templates/Base.j2")),
    ("Vlan", include_str!("../templates/Vlan.j2")),
    ("DHCP", include_str!("../templates/DHCP.j2")),
];

const TEMPLATE_EXTENSION: &str = "j2";

/// Name under which parameters are exposed to templates
const CONTEXT_ROOT: &str = "config";

/// Named command templates, parsed once at load time.
///
/// Templates use a small subset of Jinja: `{{ path }}` substitution,
/// `{% if %}`/`{% else %}`/`{% endif %}`, `{% for x in path %}` and
/// `{# comments #}`. Rendering has no side effects, so the same parameters
/// always produce the same command text.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    templates: IndexMap<String, Vec<Node>>,
}

impl TemplateEngine {
    /// Engine holding the templates compiled into the binary
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut engine = Self::default();
        for (name, source) in BUILTIN_TEMPLATES {
            engine.add(name, source)?;
        }
        Ok(engine)
    }

    /// Load every `*.j2` file in `path`. Sub-directories named after a
    /// dialect (`cisco_nxos/`, ...) hold per-dialect overrides.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let mut engine = Self::default();
        engine.load_dir(path, None)?;

        let entries = std::fs::read_dir(path).map_err(|e| directory_error(path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| directory_error(path, e))?;
            let sub = entry.path();
            if !sub.is_dir() {
                continue;
            }
            let Some(dir_name) = sub.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match dir_name.parse::<Dialect>() {
                Ok(dialect) => engine.load_dir(&sub, Some(dialect))?,
                Err(_) => log::debug!("Ignoring template sub-directory {}", sub.display()),
            }
        }

        log::info!(
            "Loaded {} templates from {}",
            engine.templates.len(),
            path.display()
        );
        Ok(engine)
    }

    /// Builtins overlaid with the contents of `path`, when given
    pub fn with_overrides(path: Option<&Path>) -> Result<Self, TemplateError> {
        let mut engine = Self::builtin()?;
        if let Some(path) = path {
            let overrides = Self::from_dir(path)?;
            engine.templates.extend(overrides.templates);
        }
        Ok(engine)
    }

    /// Register `source` under `name`, replacing any previous template
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let nodes = parse(name, source)?;
        log::debug!("Registered template {}", name);
        self.templates.insert(name.to_string(), nodes);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Render `name` with `params` bound to `config`.
    pub fn render<T: Serialize>(&self, params: &T, name: &str) -> Result<CommandSet, TemplateError> {
        let nodes = self.templates.get(name).ok_or_else(|| TemplateError::Missing {
            name: name.to_string(),
        })?;

        let context = serde_json::to_value(params).map_err(|e| TemplateError::Malformed {
            name: name.to_string(),
            message: format!("parameters cannot be serialised: {}", e),
        })?;

        let mut renderer = Renderer {
            template: name,
            scopes: vec![(CONTEXT_ROOT.to_string(), context)],
            output: String::new(),
        };
        renderer.render_nodes(nodes)?;

        let commands = CommandSet::from_rendered(&renderer.output);
        log::debug!("Rendered template {} into {} lines", name, commands.len());
        Ok(commands)
    }

    /// Render the dialect override of `name` when one exists, the shared
    /// template otherwise.
    pub fn render_for<T: Serialize>(
        &self,
        dialect: Dialect,
        params: &T,
        name: &str,
    ) -> Result<CommandSet, TemplateError> {
        let qualified = qualified_name(dialect, name);
        if self.contains(&qualified) {
            return self.render(params, &qualified);
        }
        self.render(params, name)
    }

    fn load_dir(&mut self, dir: &Path, dialect: Option<Dialect>) -> Result<(), TemplateError> {
        let entries = std::fs::read_dir(dir).map_err(|e| directory_error(dir, e))?;
        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(TEMPLATE_EXTENSION)
            })
            .collect();
        files.sort();

        for file in files {
            let Some(stem) = file.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&file).map_err(|e| directory_error(&file, e))?;
            let name = match dialect {
                Some(dialect) => qualified_name(dialect, stem),
                None => stem.to_string(),
            };
            self.add(&name, &source)?;
        }
        Ok(())
    }
}

fn qualified_name(dialect: Dialect, name: &str) -> String {
    format!("{}/{}", dialect.as_str(), name)
}

fn directory_error(path: &Path, err: std::io::Error) -> TemplateError {
    TemplateError::Directory {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

struct Renderer<'a> {
    template: &'a str,
    // innermost binding last
    scopes: Vec<(String, Value)>,
    output: String,
}

impl Renderer<'_> {
    fn render_nodes(&mut self, nodes: &[Node]) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.output.push_str(text),
                Node::Expr(path) => {
                    let value = match self.lookup(path) {
                        Some(Value::Null) | None => {
                            return Err(TemplateError::UnresolvedField {
                                template: self.template.to_string(),
                                field: path.clone(),
                            })
                        }
                        Some(value) => display(value),
                    };
                    self.output.push_str(&value);
                }
                Node::If {
                    path,
                    negate,
                    then,
                    otherwise,
                } => {
                    let truthy = self.lookup(path).map_or(false, is_truthy);
                    if truthy != *negate {
                        self.render_nodes(then)?;
                    } else {
                        self.render_nodes(otherwise)?;
                    }
                }
                Node::For { var, path, body } => {
                    let items = match self.lookup(path) {
                        Some(Value::Array(items)) => items.clone(),
                        Some(Value::Null) | None => Vec::new(),
                        Some(_) => {
                            return Err(TemplateError::Malformed {
                                name: self.template.to_string(),
                                message: format!("'{}' is not a list", path),
                            })
                        }
                    };
                    for item in items {
                        self.scopes.push((var.clone(), item));
                        let result = self.render_nodes(body);
                        self.scopes.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let mut value = self
            .scopes
            .iter()
            .rev()
            .find(|(name, _)| name == root)
            .map(|(_, value)| value)?;
        for segment in segments {
            value = match value {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

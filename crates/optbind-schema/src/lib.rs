//! Declarative description of an option registry.
//!
//! A [`RegistrySchema`] is a JSON document listing the options, operands and
//! subcommands of a program. [`RegistrySchema::build`] registers all of them on
//! a fresh [`Registry`], so every registration rule (name collisions, operand
//! layout, default conversion) is checked exactly as for hand-written code.
//!
//! ```json
//! {
//!   "format-version": 1,
//!   "name": "tool",
//!   "options": [
//!     { "name": "verbose", "short": ["v"] },
//!     { "name": "level", "short": ["l"], "value-type": "int", "default": ["1"] },
//!     { "name": "files", "positional": true, "kind": "vector", "value-type": "path" }
//!   ],
//!   "commands": [{ "name": "build", "aliases": ["b"] }]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use optbind::{CommandId, OptionDef, ParserConfig, Registry, ValueType};
use serde::{Deserialize, Serialize};

/// The only schema format this crate reads.
pub const SCHEMA_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    SCHEMA_FORMAT_VERSION
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgKind {
    Flag,
    Single,
    Vector,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OptionSchema {
    pub name: String,
    /// Defaults to `single` when a value type is given or the entry is
    /// positional, `flag` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArgKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub positional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short: Vec<char>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit: Option<String>,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub optional_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargs: Option<i32>,
    #[serde(default, rename = "final")]
    pub final_operand: bool,
    /// Operands are required unless this is `false`; options are optional
    /// unless it is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    #[serde(default)]
    pub group: u32,
}

impl OptionSchema {
    pub fn kind(&self) -> ArgKind {
        self.kind.unwrap_or(if self.positional || self.value_type.is_some() {
            ArgKind::Single
        } else {
            ArgKind::Flag
        })
    }

    /// The equivalent definition. Registration validates it.
    pub fn to_def(&self) -> Result<OptionDef> {
        let kind = self.kind();
        let value_type = self.value_type.unwrap_or(match kind {
            ArgKind::Flag => ValueType::Bool,
            ArgKind::Single | ArgKind::Vector => ValueType::String,
        });

        let mut def = match (self.positional, kind) {
            (true, ArgKind::Flag) => bail!("positional '{}' cannot be a flag", self.name),
            (true, ArgKind::Single) => OptionDef::operand(&self.name, value_type),
            (true, ArgKind::Vector) => OptionDef::operand(&self.name, value_type).many(),
            (false, ArgKind::Flag) => {
                if value_type != ValueType::Bool {
                    bail!("flag '{}' must have value type bool", self.name);
                }
                OptionDef::flag(&self.name)
            }
            (false, ArgKind::Single) => OptionDef::single(&self.name, value_type),
            (false, ArgKind::Vector) => OptionDef::vector(&self.name, value_type),
        };

        for &c in &self.short {
            def = def.short(c);
        }
        for long in &self.long {
            def = def.long(long);
        }
        for raw in &self.default {
            def = def.default(raw);
        }
        if self.optional_value {
            def = def.optional_value();
        }
        if let Some(implicit) = &self.implicit {
            def = def.implicit(implicit);
        }
        if self.invert {
            def = def.invert();
        }
        if let Some(nargs) = self.nargs {
            def = def.nargs(nargs);
        }
        if self.final_operand {
            def = def.final_operand();
        }
        match self.required {
            Some(true) => def = def.required(),
            Some(false) => def = def.optional(),
            None => {}
        }
        if let Some(env) = &self.env {
            def = def.env(env);
        }
        if !self.possible_values.is_empty() {
            def = def.choices(&self.possible_values);
        }
        if self.group != 0 {
            def = def.group(self.group);
        }
        Ok(def)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistrySchema {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub name: String,
    #[serde(default)]
    pub config: ParserConfig,
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
}

impl RegistrySchema {
    pub fn from_json(text: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(text).context("failed to parse schema JSON")?;
        if schema.format_version != SCHEMA_FORMAT_VERSION {
            bail!(
                "unsupported schema format version {} (expected {})",
                schema.format_version,
                SCHEMA_FORMAT_VERSION
            );
        }
        Ok(schema)
    }

    /// Register everything on a new registry.
    pub fn build(&self) -> Result<Registry> {
        let mut reg = Registry::with_config(&self.name, self.config.clone());
        let root = reg.root();
        reg.allow_unknown(root, self.allow_unknown)?;
        add_options(&mut reg, root, &self.name, &self.options)?;
        for cmd in &self.commands {
            add_command(&mut reg, root, cmd)?;
        }
        Ok(reg)
    }
}

fn add_options(
    reg: &mut Registry,
    scope: CommandId,
    scope_name: &str,
    options: &[OptionSchema],
) -> Result<()> {
    for option in options {
        let def = option
            .to_def()
            .with_context(|| format!("invalid option in command '{scope_name}'"))?;
        reg.add_to(scope, def).with_context(|| {
            format!(
                "failed to register option '{}' in command '{scope_name}'",
                option.name
            )
        })?;
    }
    Ok(())
}

fn add_command(reg: &mut Registry, parent: CommandId, schema: &CommandSchema) -> Result<()> {
    let id = reg
        .add_command(parent, &schema.name)
        .with_context(|| format!("failed to register command '{}'", schema.name))?;
    for alias in &schema.aliases {
        reg.add_alias(id, alias)
            .with_context(|| format!("failed to register alias '{alias}' of '{}'", schema.name))?;
    }
    reg.allow_unknown(id, schema.allow_unknown)?;
    add_options(reg, id, &schema.name, &schema.options)?;
    for child in &schema.commands {
        add_command(reg, id, child)?;
    }
    Ok(())
}

/// Read and parse a schema file.
pub fn load_schema(path: &Path) -> Result<RegistrySchema> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read schema: {}", path.display()))?;
    RegistrySchema::from_json(&text).with_context(|| format!("invalid schema: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optbind::ConfigError;

    const TOOL: &str = r#"{
        "name": "tool",
        "config": { "max-response-depth": 4 },
        "options": [
            { "name": "verbose", "short": ["v"], "long": ["verbose"] },
            { "name": "level", "short": ["l"], "value-type": "int", "default": ["1"] },
            { "name": "files", "positional": true, "kind": "vector", "value-type": "path", "required": false }
        ],
        "commands": [
            {
                "name": "build",
                "aliases": ["b"],
                "options": [
                    { "name": "release", "long": ["release"] },
                    { "name": "target", "value-type": "string", "possible-values": ["x86", "arm"] }
                ]
            }
        ]
    }"#;

    #[test]
    fn builds_a_registry() {
        let schema = RegistrySchema::from_json(TOOL).unwrap();
        assert_eq!(schema.format_version, SCHEMA_FORMAT_VERSION);
        assert_eq!(schema.options[0].kind(), ArgKind::Flag);
        assert_eq!(schema.options[1].kind(), ArgKind::Single);

        let mut reg = schema.build().unwrap();
        assert_eq!(reg.config().max_response_depth, 4);
        assert!(reg.config().response_files);

        let m = reg.parse(&["-v", "a.txt", "b.txt"]).unwrap();
        assert_eq!(m.get::<bool>("verbose"), Some(true));
        assert_eq!(m.get::<i64>("level"), Some(1));
        assert_eq!(m.get::<Vec<std::path::PathBuf>>("files").map(|f| f.len()), Some(2));

        let m = reg.parse(&["b", "--release", "--target=arm"]).unwrap();
        assert_eq!(m.command_path(), ["build"]);
        assert_eq!(m.get::<String>("target").as_deref(), Some("arm"));
        assert!(reg.parse(&["build", "--target=mips"]).is_err());
    }

    #[test]
    fn registration_errors_keep_their_type() {
        let schema = RegistrySchema::from_json(
            r#"{ "name": "t", "options": [
                { "name": "a", "short": ["x"] },
                { "name": "b", "short": ["x"] }
            ] }"#,
        )
        .unwrap();
        let err = schema.build().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateShort { short: 'x', .. })
        ));
    }

    #[test]
    fn rejects_unknown_format_versions_and_flag_operands() {
        let err = RegistrySchema::from_json(r#"{ "format-version": 2, "name": "t" }"#).unwrap_err();
        assert!(err.to_string().contains("unsupported schema format version 2"));

        let schema = RegistrySchema::from_json(
            r#"{ "name": "t", "options": [{ "name": "x", "positional": true, "kind": "flag" }] }"#,
        )
        .unwrap();
        assert!(schema.build().is_err());
    }

    #[test]
    fn load_schema_reports_the_path() {
        let err = load_schema(Path::new("/nonexistent/optbind-schema.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/optbind-schema.json"));
    }
}

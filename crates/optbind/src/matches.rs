//! The result of a successful parse.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::binder::Source;
use crate::registry::{Action, CommandId, OptionId};
use crate::value::{Bindable, Bound};

/// How a token was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawKind {
    Operand,
    Option,
    CommandName,
    Unknown,
}

/// A token as the parser understood it, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawValue {
    pub kind: RawKind,
    #[serde(skip)]
    pub option: Option<OptionId>,
    pub text: String,
    /// Index in the original argv (the `@file` argument for expanded tokens).
    pub origin: usize,
}

/// Value of one option or operand visible in the selected command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    #[serde(skip)]
    pub id: OptionId,
    pub value: Bound,
    pub source: Source,
}

pub struct Matches {
    pub(crate) command: CommandId,
    pub(crate) path: Vec<String>,
    pub(crate) values: IndexMap<String, Binding>,
    pub(crate) shadowed: Vec<Binding>,
    pub(crate) unknown: Vec<String>,
    pub(crate) raw: Vec<RawValue>,
    pub(crate) action: Option<Action>,
}

impl fmt::Debug for Matches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matches")
            .field("command", &self.command)
            .field("path", &self.path)
            .field("values", &self.values)
            .field("shadowed", &self.shadowed)
            .field("unknown", &self.unknown)
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl Matches {
    /// The selected command scope.
    pub fn command(&self) -> CommandId {
        self.command
    }

    /// Subcommand names that were entered, outermost first.
    pub fn command_path(&self) -> &[String] {
        &self.path
    }

    /// Typed value of an option or operand by name.
    pub fn get<T: Bindable>(&self, name: &str) -> Option<T> {
        self.values.get(name).and_then(|b| T::from_bound(&b.value))
    }

    pub fn value(&self, name: &str) -> Option<&Bound> {
        self.values.get(name).map(|b| &b.value)
    }

    /// Whether the option or operand was given on the command line.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.source(name) == Some(Source::Argv)
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.values.get(name).map(|b| b.source)
    }

    /// All bindings of the selected command, in declaration order.
    pub fn values(&self) -> &IndexMap<String, Binding> {
        &self.values
    }

    /// Ancestor options hidden by a same-named option of the selected
    /// command. They keep whatever was given before the subcommand name.
    pub fn shadowed(&self) -> &[Binding] {
        &self.shadowed
    }

    /// Tokens nobody claimed, verbatim and in input order.
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    pub fn raw_values(&self) -> &[RawValue] {
        &self.raw
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Run the selected command's action, if it has one.
    pub fn dispatch(&self) -> Option<anyhow::Result<()>> {
        self.action.as_ref().map(|action| action(self))
    }
}

#[cfg(test)]
mod tests {
    use crate::def::OptionDef;
    use crate::registry::Registry;
    use crate::value::ValueType;

    #[test]
    fn bindings_serialize_in_declaration_order() {
        let mut reg = Registry::new("tool");
        reg.add(OptionDef::flag("verbose").short('v')).unwrap();
        reg.add(OptionDef::vector("tag", ValueType::String).short('t'))
            .unwrap();
        reg.add(OptionDef::single("level", ValueType::Int)).unwrap();

        let m = reg.parse(&["-t", "a", "-t", "b"]).unwrap();
        let json = serde_json::to_value(m.values()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "verbose": { "value": false, "source": "default" },
                "tag": { "value": ["a", "b"], "source": "argv" },
                "level": { "value": null, "source": "default" },
            })
        );
        let keys: Vec<&str> = m.values().keys().map(String::as_str).collect();
        assert_eq!(keys, ["verbose", "tag", "level"]);
        assert!(m.is_explicit("tag"));
        assert!(!m.is_explicit("level"));
    }
}

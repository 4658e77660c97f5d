//! The option registry: sole owner of definitions and command scopes.

use std::fmt;
use std::rc::Rc;

use crate::binder::{Binder, Shared};
use crate::config::ParserConfig;
use crate::def::{OptionDef, OptionKind};
use crate::dispatch;
use crate::error::{ConfigError, ParseResult};
use crate::index::{OptIndex, ancestry};
use crate::matches::Matches;
use crate::parser::Parser;
use crate::reader::{FsSource, ResponseSource, expand};
use crate::value::{Bindable, Bound};

/// Handle to a registered option or operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionId(pub(crate) usize);

/// Handle to a command scope. The root scope is [`Registry::root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub(crate) usize);

/// Caller code run for the selected command after a successful parse.
pub type Action = Rc<dyn Fn(&Matches) -> anyhow::Result<()>>;

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) def: OptionDef,
    pub(crate) binder: Binder,
    /// Command the option was registered in.
    pub(crate) scope: CommandId,
}

pub(crate) struct Command {
    pub(crate) name: String,
    pub(crate) parent: Option<CommandId>,
    pub(crate) aliases: Vec<String>,
    pub(crate) allow_unknown: bool,
    pub(crate) action: Option<Action>,
    pub(crate) children: Vec<CommandId>,
    pub(crate) options: Vec<OptionId>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("aliases", &self.aliases)
            .field("allow_unknown", &self.allow_unknown)
            .field("action", &self.action.is_some())
            .field("children", &self.children)
            .field("options", &self.options)
            .finish()
    }
}

/// Definitions, command scopes and the bound values of the last parse.
///
/// Registration and parsing both take `&mut self`, so a registry cannot be
/// changed while a parse is running and two parses cannot overlap.
#[derive(Debug)]
pub struct Registry {
    pub(crate) config: ParserConfig,
    pub(crate) entries: Vec<Entry>,
    pub(crate) commands: Vec<Command>,
    pub(crate) indexes: Vec<OptIndex>,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ParserConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ParserConfig) -> Self {
        let root = Command {
            name: name.into(),
            parent: None,
            aliases: Vec::new(),
            allow_unknown: false,
            action: None,
            children: Vec::new(),
            options: Vec::new(),
        };
        let mut reg = Self {
            config,
            entries: Vec::new(),
            commands: vec![root],
            indexes: Vec::new(),
        };
        // An empty scope cannot conflict.
        if let Ok(indexes) = reg.build_indexes() {
            reg.indexes = indexes;
        }
        reg
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn root(&self) -> CommandId {
        CommandId(0)
    }

    /// Register in the root scope; root options are inherited by every command.
    pub fn add(&mut self, def: OptionDef) -> Result<OptionId, ConfigError> {
        self.add_to(self.root(), def)
    }

    pub fn add_to(&mut self, scope: CommandId, def: OptionDef) -> Result<OptionId, ConfigError> {
        def.validate()?;
        let default = def.default_bound()?;
        self.insert(scope, def, default, None)
    }

    /// Register an option whose value is also written to `target` after every
    /// parse. Without a declared default, the target's current value is the default.
    pub fn bind<T: Bindable>(
        &mut self,
        scope: CommandId,
        def: OptionDef,
        target: &Shared<T>,
    ) -> Result<OptionId, ConfigError> {
        def.validate()?;
        if T::TYPE != def.value_type || T::VECTOR != (def.kind == OptionKind::Vector) {
            return Err(ConfigError::InvalidCombination {
                name: def.name.clone(),
                reason: "bound variable does not match the declared type",
            });
        }
        let default = if def.defaults.is_empty() {
            target.borrow().to_bound()
        } else {
            def.default_bound()?
        };
        let sink: Rc<dyn crate::binder::Sink> = target.clone();
        self.insert(scope, def, default, Some(sink))
    }

    fn insert(
        &mut self,
        scope: CommandId,
        mut def: OptionDef,
        default: Bound,
        sink: Option<Rc<dyn crate::binder::Sink>>,
    ) -> Result<OptionId, ConfigError> {
        let cmd = self.command(scope)?;
        if cmd
            .options
            .iter()
            .any(|id| self.entries[id.0].def.name == def.name)
        {
            return Err(ConfigError::DuplicateOption {
                command: cmd.name.clone(),
                name: def.name.clone(),
            });
        }

        let id = OptionId(self.entries.len());
        def.order = id.0;
        let mut binder = Binder::new(&def, default);
        if let Some(sink) = sink {
            binder.attach(sink);
            binder.publish();
        }
        self.entries.push(Entry { def, binder, scope });
        self.commands[scope.0].options.push(id);

        match self.build_indexes() {
            Ok(indexes) => {
                self.indexes = indexes;
                Ok(id)
            }
            Err(err) => {
                self.commands[scope.0].options.pop();
                self.entries.pop();
                Err(err)
            }
        }
    }

    pub fn add_command(
        &mut self,
        parent: CommandId,
        name: impl Into<String>,
    ) -> Result<CommandId, ConfigError> {
        let name = name.into();
        self.command(parent)?;
        dispatch::check_new_name(&self.commands, parent, &name)?;

        let id = CommandId(self.commands.len());
        self.commands.push(Command {
            name,
            parent: Some(parent),
            aliases: Vec::new(),
            allow_unknown: false,
            action: None,
            children: Vec::new(),
            options: Vec::new(),
        });
        self.commands[parent.0].children.push(id);
        let index = OptIndex::build(&self.entries, &self.commands, id)?;
        self.indexes.push(index);
        Ok(id)
    }

    pub fn add_alias(&mut self, command: CommandId, alias: impl Into<String>) -> Result<(), ConfigError> {
        let alias = alias.into();
        let cmd = self.command(command)?;
        let Some(parent) = cmd.parent else {
            return Err(ConfigError::InvalidName {
                name: alias,
                reason: "the root command cannot have aliases",
            });
        };
        if alias == cmd.name || cmd.aliases.contains(&alias) {
            return Ok(());
        }
        dispatch::check_new_name(&self.commands, parent, &alias)?;
        self.commands[command.0].aliases.push(alias);
        Ok(())
    }

    /// Collect unrecognized options and excess operands instead of failing.
    pub fn allow_unknown(&mut self, command: CommandId, allow: bool) -> Result<(), ConfigError> {
        self.command(command)?;
        self.commands[command.0].allow_unknown = allow;
        Ok(())
    }

    pub fn set_action<F>(&mut self, command: CommandId, action: F) -> Result<(), ConfigError>
    where
        F: Fn(&Matches) -> anyhow::Result<()> + 'static,
    {
        self.command(command)?;
        self.commands[command.0].action = Some(Rc::new(action));
        Ok(())
    }

    fn command(&self, id: CommandId) -> Result<&Command, ConfigError> {
        self.commands
            .get(id.0)
            .ok_or(ConfigError::UnknownCommand(id.0))
    }

    fn build_indexes(&self) -> Result<Vec<OptIndex>, ConfigError> {
        (0..self.commands.len())
            .map(|i| OptIndex::build(&self.entries, &self.commands, CommandId(i)))
            .collect()
    }

    pub fn def(&self, id: OptionId) -> &OptionDef {
        &self.entries[id.0].def
    }

    pub fn defs(&self) -> impl Iterator<Item = (OptionId, &OptionDef)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (OptionId(i), &e.def))
    }

    /// Registry-owned storage of an option: its value after the last parse.
    pub fn value(&self, id: OptionId) -> &Bound {
        self.entries[id.0].binder.current()
    }

    pub fn get<T: Bindable>(&self, id: OptionId) -> Option<T> {
        T::from_bound(self.value(id))
    }

    pub fn index(&self, command: CommandId) -> &OptIndex {
        &self.indexes[command.0]
    }

    pub fn command_name(&self, command: CommandId) -> &str {
        &self.commands[command.0].name
    }

    pub fn subcommands(&self, command: CommandId) -> &[CommandId] {
        &self.commands[command.0].children
    }

    pub fn command_ids(&self) -> impl Iterator<Item = CommandId> + '_ {
        (0..self.commands.len()).map(CommandId)
    }

    /// Command names from the root (excluded) down to `command`.
    pub fn command_path(&self, command: CommandId) -> Vec<String> {
        ancestry(&self.commands, command)
            .into_iter()
            .skip(1)
            .map(|id| self.commands[id.0].name.clone())
            .collect()
    }

    /// Parse `argv` (without the program name) reading response files from disk.
    pub fn parse<S: AsRef<str>>(&mut self, argv: &[S]) -> ParseResult<Matches> {
        self.parse_with(argv, &[], &FsSource)
    }

    /// Like [`parse`](Self::parse), with `env` as a fallback for options that
    /// declare an environment variable. Precedence: argv, env, default.
    pub fn parse_with_env<S: AsRef<str>>(
        &mut self,
        argv: &[S],
        env: &[(String, String)],
    ) -> ParseResult<Matches> {
        self.parse_with(argv, env, &FsSource)
    }

    pub fn parse_with<S: AsRef<str>>(
        &mut self,
        argv: &[S],
        env: &[(String, String)],
        source: &dyn ResponseSource,
    ) -> ParseResult<Matches> {
        for entry in &mut self.entries {
            entry.binder.reset();
        }

        let result = expand(argv, source, &self.config)
            .map_err(Into::into)
            .and_then(|tokens| Parser::new(self, &tokens, env).run());

        match &result {
            Ok(m) => tracing::debug!(
                command = %self.commands[m.command().0].name,
                unknown = m.unknown().len(),
                "parse succeeded"
            ),
            Err(err) => {
                tracing::debug!(error = %err, "parse failed, restoring defaults");
                for entry in &mut self.entries {
                    entry.binder.reset();
                }
            }
        }
        for entry in &self.entries {
            entry.binder.publish();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::shared;
    use crate::value::ValueType;

    #[test]
    fn duplicate_names_fail_at_registration() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::flag("verbose").short('v')).unwrap();
        let err = reg
            .add(OptionDef::flag("version").short('v'))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateShort { short: 'v', .. }));
        let err = reg.add(OptionDef::flag("verbose")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOption { .. }));

        // The failed registrations left nothing behind.
        assert_eq!(reg.defs().count(), 1);
        assert!(reg.add(OptionDef::flag("version").short('V')).is_ok());
    }

    #[test]
    fn bind_checks_the_variable_type() {
        let mut reg = Registry::new("t");
        let target = shared(0i64);
        let err = reg
            .bind(reg.root(), OptionDef::single("n", ValueType::Float), &target)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCombination { .. }));
        let target = shared(Vec::<i64>::new());
        let err = reg
            .bind(reg.root(), OptionDef::single("n", ValueType::Int), &target)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCombination { .. }));
    }

    #[test]
    fn bound_variable_supplies_the_default() {
        let mut reg = Registry::new("t");
        let jobs = shared(4u64);
        let id = reg
            .bind(reg.root(), OptionDef::single("jobs", ValueType::UInt).short('j'), &jobs)
            .unwrap();
        reg.parse(&["-j", "8"]).unwrap();
        assert_eq!(*jobs.borrow(), 8);
        reg.parse::<&str>(&[]).unwrap();
        assert_eq!(*jobs.borrow(), 4);
        assert_eq!(reg.get::<u64>(id), Some(4));
    }

    #[test]
    fn commands_and_aliases_must_be_unique() {
        let mut reg = Registry::new("t");
        let build = reg.add_command(reg.root(), "build").unwrap();
        reg.add_alias(build, "b").unwrap();
        let err = reg.add_command(reg.root(), "build").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCommand { .. }));
        let err = reg.add_command(reg.root(), "b").unwrap_err();
        assert!(matches!(err, ConfigError::AliasConflict { .. }));
        let bench = reg.add_command(reg.root(), "bench").unwrap();
        let err = reg.add_alias(bench, "b").unwrap_err();
        assert!(matches!(err, ConfigError::AliasConflict { .. }));
        assert!(reg.add_alias(reg.root(), "x").is_err());
    }

    #[test]
    fn command_path_skips_the_root() {
        let mut reg = Registry::new("tool");
        let remote = reg.add_command(reg.root(), "remote").unwrap();
        let add = reg.add_command(remote, "add").unwrap();
        assert_eq!(reg.command_path(add), vec!["remote", "add"]);
        assert!(reg.command_path(reg.root()).is_empty());
        assert_eq!(reg.subcommands(reg.root()), &[remote]);
    }
}

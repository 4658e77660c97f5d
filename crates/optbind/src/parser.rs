//! The single-pass parse state machine.
//!
//! Tokens are consumed left to right without backtracking. Which rule applies
//! to a token depends on the current [`Mode`] and on whether `--` has been
//! seen; both only ever move forward.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::binder::Source;
use crate::config::ParserConfig;
use crate::def::OptionKind;
use crate::dispatch;
use crate::error::{ParseError, ParseResult, UsageError, UsageErrorKind};
use crate::index::{OptIndex, Resolved, ancestry};
use crate::matches::{Binding, Matches, RawKind, RawValue};
use crate::reader::Token;
use crate::registry::{Command, CommandId, Entry, OptionId, Registry};
use crate::value::Value;

/// Where the parser is in the argument vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Subcommand names are still recognized.
    PreCommand,
    /// Inside the selected command; options and operands.
    InCommandArgs,
    /// An unknown argument was collected; everything else is collected too.
    InUnknownArgs,
    /// The final operand started; everything else is an operand.
    OperandsOnly,
}

/// What the parser just did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    EnterCommand { has_subcommands: bool },
    BindOption,
    BindOperand { final_slot: bool },
    Unknown,
}

impl Mode {
    pub fn initial(has_subcommands: bool) -> Self {
        if has_subcommands {
            Self::PreCommand
        } else {
            Self::InCommandArgs
        }
    }

    /// Next mode after `event`. `InUnknownArgs` and `OperandsOnly` are never left.
    pub fn transition(self, event: Event) -> Self {
        match (self, event) {
            (Self::InUnknownArgs | Self::OperandsOnly, _) => self,
            (_, Event::Unknown) => Self::InUnknownArgs,
            (_, Event::BindOperand { final_slot: true }) => Self::OperandsOnly,
            (Self::PreCommand, Event::EnterCommand { has_subcommands: true }) => Self::PreCommand,
            (Self::PreCommand, Event::BindOption) => Self::PreCommand,
            (Self::PreCommand | Self::InCommandArgs, _) => Self::InCommandArgs,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ParseState {
    cursor: usize,
    mode: Mode,
    more_opts: bool,
    scope: CommandId,
    /// Next operand slot and how many values it holds.
    slot: usize,
    slot_fill: usize,
    /// Values taken by the current occurrence of each vector option.
    counters: HashMap<OptionId, usize>,
}

pub(crate) struct Parser<'r> {
    config: &'r ParserConfig,
    entries: &'r mut [Entry],
    commands: &'r [Command],
    indexes: &'r [OptIndex],
    tokens: &'r [Token],
    env: &'r [(String, String)],
    state: ParseState,
    path: Vec<String>,
    unknown: Vec<String>,
    raw: Vec<RawValue>,
}

impl<'r> Parser<'r> {
    pub(crate) fn new(
        registry: &'r mut Registry,
        tokens: &'r [Token],
        env: &'r [(String, String)],
    ) -> Self {
        let Registry {
            config,
            entries,
            commands,
            indexes,
        } = registry;
        let root = CommandId(0);
        let state = ParseState {
            cursor: 0,
            mode: Mode::initial(!commands[root.0].children.is_empty()),
            more_opts: true,
            scope: root,
            slot: 0,
            slot_fill: 0,
            counters: HashMap::new(),
        };
        Self {
            config,
            entries: entries.as_mut_slice(),
            commands: commands.as_slice(),
            indexes: indexes.as_slice(),
            tokens,
            env,
            state,
            path: Vec::new(),
            unknown: Vec::new(),
            raw: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> ParseResult<Matches> {
        let tokens = self.tokens;
        while let Some(token) = tokens.get(self.state.cursor) {
            match self.state.mode {
                Mode::InUnknownArgs => {
                    self.collect_unknown(token);
                    continue;
                }
                Mode::OperandsOnly => {
                    self.operand(token)?;
                    continue;
                }
                Mode::PreCommand | Mode::InCommandArgs => {}
            }

            if token.text == "--" && self.ends_variable_operand() {
                tracing::trace!(origin = token.origin, "end of variable operand");
                self.state.slot += 1;
                self.state.slot_fill = 0;
                self.state.more_opts = false;
                self.state.cursor += 1;
            } else if self.state.more_opts && token.text == "--" {
                tracing::trace!(origin = token.origin, "end of options");
                self.state.more_opts = false;
                self.state.cursor += 1;
            } else if self.state.more_opts && self.is_option_like(&token.text) {
                self.option(token)?;
            } else {
                self.operand(token)?;
            }
        }
        self.finish()
    }

    fn index(&self) -> &'r OptIndex {
        &self.indexes[self.state.scope.0]
    }

    /// Whether the current slot is a vector operand with values that a later
    /// final operand is waiting behind. A `--` ends such an operand.
    fn ends_variable_operand(&self) -> bool {
        let index = self.index();
        if self.state.slot_fill == 0 || index.final_slot().is_none_or(|f| f <= self.state.slot) {
            return false;
        }
        index
            .positionals()
            .get(self.state.slot)
            .is_some_and(|id| self.entries[id.0].def.kind == OptionKind::Vector)
    }

    fn allows_unknown(&self) -> bool {
        self.commands[self.state.scope.0].allow_unknown
    }

    fn is_option_like(&self, text: &str) -> bool {
        let Some(body) = text.strip_prefix('-') else {
            return false;
        };
        if body.is_empty() {
            return false;
        }
        !(self.config.allow_negative_numbers
            && !self.index().has_digit_shorts()
            && looks_numeric(body))
    }

    /// Whether `text` would be taken as a known option in the current scope.
    fn names_option(&self, text: &str) -> bool {
        self.is_option_like(text) && self.index().resolve_token(text).is_some()
    }

    fn option(&mut self, token: &'r Token) -> ParseResult<()> {
        let index = self.index();
        let text = token.text.as_str();

        if let Some(rest) = text.strip_prefix("--") {
            let (name, attached) = match rest.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (rest, None),
            };
            let Some(resolved) = index.long(name) else {
                return self.unresolved(token);
            };
            self.state.cursor += 1;
            return self.apply(resolved, &format!("--{name}"), attached, token);
        }

        // Short cluster. Resolve every character before applying any of them.
        let body = &text[1..];
        let mut plan: Vec<(Resolved, char, Option<&'r str>)> = Vec::new();
        for (pos, c) in body.char_indices() {
            let Some(resolved) = index.short(c) else {
                return self.unresolved(token);
            };
            if self.entries[resolved.id.0].def.kind == OptionKind::Flag {
                plan.push((resolved, c, None));
                continue;
            }
            let rest = &body[pos + c.len_utf8()..];
            let rest = rest.strip_prefix('=').unwrap_or(rest);
            plan.push((resolved, c, (!rest.is_empty()).then_some(rest)));
            break;
        }

        self.state.cursor += 1;
        for (resolved, c, attached) in plan {
            self.apply(resolved, &format!("-{c}"), attached, token)?;
        }
        Ok(())
    }

    fn unresolved(&mut self, token: &'r Token) -> ParseResult<()> {
        if self.allows_unknown() {
            self.collect_unknown(token);
            return Ok(());
        }
        Err(UsageError::new(UsageErrorKind::UnknownOption, &token.text)
            .at(token.origin)
            .into())
    }

    fn collect_unknown(&mut self, token: &'r Token) {
        tracing::trace!(token = %token.text, origin = token.origin, "collecting unknown argument");
        self.unknown.push(token.text.clone());
        self.push_raw(RawKind::Unknown, None, &token.text, token.origin);
        self.state.mode = self.state.mode.transition(Event::Unknown);
        self.state.cursor += 1;
    }

    fn apply(
        &mut self,
        resolved: Resolved,
        spelling: &str,
        attached: Option<&'r str>,
        token: &'r Token,
    ) -> ParseResult<()> {
        let id = resolved.id;
        match self.entries[id.0].def.kind {
            OptionKind::Flag => {
                let on = match attached {
                    None => !resolved.inverted,
                    Some(raw) if resolved.inverted => {
                        return Err(UsageError::new(UsageErrorKind::InvalidValue, raw)
                            .with_option(spelling)
                            .with_detail("takes no value")
                            .at(token.origin)
                            .into());
                    }
                    Some(raw) => self.convert(id, raw, spelling, token.origin)? == Value::Bool(true),
                };
                self.store(id, Value::Bool(on));
            }
            OptionKind::Single => {
                let value = match attached {
                    Some(raw) => Some((raw, token.origin)),
                    None => self
                        .take_value(id)
                        .map(|next| (next.text.as_str(), next.origin)),
                };
                match value {
                    Some((raw, origin)) => {
                        let value = self.convert(id, raw, spelling, origin)?;
                        self.store(id, value);
                    }
                    None => self.omitted(id, spelling, token.origin)?,
                }
            }
            OptionKind::Vector => {
                let cap = self.entries[id.0].def.nargs_cap();
                self.state.counters.insert(id, 0);
                if let Some(raw) = attached {
                    let value = self.convert(id, raw, spelling, token.origin)?;
                    self.store(id, value);
                    self.state.counters.insert(id, 1);
                } else {
                    while cap.is_none_or(|cap| self.matched(id) < cap) {
                        let Some(next) = self.take_value(id) else {
                            break;
                        };
                        let value = self.convert(id, &next.text, spelling, next.origin)?;
                        self.store(id, value);
                        *self.state.counters.entry(id).or_default() += 1;
                    }
                    if self.matched(id) == 0 {
                        self.omitted(id, spelling, token.origin)?;
                    }
                }
            }
        }

        self.push_raw(RawKind::Option, Some(id), spelling, token.origin);
        self.state.mode = self.state.mode.transition(Event::BindOption);
        Ok(())
    }

    /// Values taken by the current occurrence of a vector option.
    fn matched(&self, id: OptionId) -> usize {
        self.state.counters.get(&id).copied().unwrap_or(0)
    }

    /// Take the next token as a value for `id` when it can be one.
    ///
    /// An optional value never takes an option-like token, while a required
    /// value only refuses tokens that name a known option, so `--opt --bogus`
    /// binds `--bogus` only when `--opt` needs a value.
    fn take_value(&mut self, id: OptionId) -> Option<&'r Token> {
        let next = self.tokens.get(self.state.cursor)?;
        let text = next.text.as_str();
        if text == "--" {
            return None;
        }
        if self.entries[id.0].def.optional_value {
            let names_command = self.state.mode == Mode::PreCommand
                && dispatch::resolve_child(self.commands, self.state.scope, text).is_some();
            if self.is_option_like(text) || names_command {
                return None;
            }
        } else if self.names_option(text) {
            return None;
        }
        self.state.cursor += 1;
        Some(next)
    }

    /// The option appeared without a value.
    fn omitted(&mut self, id: OptionId, spelling: &str, origin: usize) -> ParseResult<()> {
        let def = &self.entries[id.0].def;
        if !def.optional_value {
            return Err(UsageError::new(UsageErrorKind::MissingValue, spelling)
                .with_option(def.display_name())
                .at(origin)
                .into());
        }
        match def.implicit.clone() {
            Some(raw) => {
                let value = self.convert(id, &raw, spelling, origin)?;
                self.store(id, value);
            }
            None => self.entries[id.0].binder.touch(),
        }
        Ok(())
    }

    fn operand(&mut self, token: &'r Token) -> ParseResult<()> {
        let text = token.text.as_str();

        if self.state.mode == Mode::PreCommand && self.state.more_opts {
            if let Some(child) = dispatch::resolve_child(self.commands, self.state.scope, text) {
                self.enter(child, token);
                return Ok(());
            }
        }

        let index = self.index();
        let positionals = index.positionals();
        while let Some(&id) = positionals.get(self.state.slot) {
            let def = &self.entries[id.0].def;
            let cap = match def.kind {
                OptionKind::Vector => def.nargs_cap(),
                OptionKind::Flag | OptionKind::Single => Some(1),
            };
            if cap.is_some_and(|cap| self.state.slot_fill >= cap) {
                self.state.slot += 1;
                self.state.slot_fill = 0;
                continue;
            }

            let spelling = def.display_name();
            let value = self.convert(id, text, &spelling, token.origin)?;
            let starts_final =
                self.state.slot_fill == 0 && index.final_slot() == Some(self.state.slot);
            if starts_final {
                tracing::debug!(operand = %spelling, "final operand reached");
            }
            self.store(id, value);
            self.state.slot_fill += 1;
            self.state.mode = self.state.mode.transition(Event::BindOperand {
                final_slot: starts_final,
            });
            self.push_raw(RawKind::Operand, Some(id), text, token.origin);
            self.state.cursor += 1;
            return Ok(());
        }

        if self.allows_unknown() {
            self.collect_unknown(token);
            return Ok(());
        }
        Err(UsageError::new(UsageErrorKind::TooManyOperands, text)
            .at(token.origin)
            .into())
    }

    fn enter(&mut self, child: CommandId, token: &'r Token) {
        let cmd = &self.commands[child.0];
        tracing::debug!(command = %cmd.name, "entering subcommand");
        self.path.push(cmd.name.clone());
        self.state.scope = child;
        self.state.slot = 0;
        self.state.slot_fill = 0;
        self.state.mode = self.state.mode.transition(Event::EnterCommand {
            has_subcommands: !cmd.children.is_empty(),
        });
        self.push_raw(RawKind::CommandName, None, &token.text, token.origin);
        self.state.cursor += 1;
    }

    fn convert(&self, id: OptionId, raw: &str, spelling: &str, origin: usize) -> ParseResult<Value> {
        self.entries[id.0].def.convert(raw).map_err(|detail| {
            ParseError::from(
                UsageError::new(UsageErrorKind::InvalidValue, raw)
                    .with_option(spelling)
                    .with_detail(detail)
                    .at(origin),
            )
        })
    }

    fn store(&mut self, id: OptionId, value: Value) {
        self.entries[id.0].binder.store(value, Source::Argv);
    }

    fn push_raw(&mut self, kind: RawKind, option: Option<OptionId>, text: &str, origin: usize) {
        tracing::trace!(?kind, text, origin, "classified token");
        self.raw.push(RawValue {
            kind,
            option,
            text: text.to_string(),
            origin,
        });
    }

    /// Options still at their default take values from the environment.
    fn apply_env(&mut self) -> ParseResult<()> {
        let index = self.index();
        for &id in index.named() {
            let entry = &self.entries[id.0];
            if entry.binder.source() != Source::Default {
                continue;
            }
            let Some(var) = entry.def.env.as_deref() else {
                continue;
            };
            let Some(raw) = self
                .env
                .iter()
                .find(|(key, _)| key == var)
                .map(|(_, value)| value.as_str())
            else {
                continue;
            };

            let parts: Vec<&str> = if entry.def.kind == OptionKind::Vector {
                raw.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect()
            } else {
                vec![raw]
            };
            let values = parts
                .into_iter()
                .map(|part| {
                    entry.def.convert(part).map_err(|detail| {
                        UsageError::new(UsageErrorKind::InvalidValue, part)
                            .with_option(format!("${var}"))
                            .with_detail(detail)
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let binder = &mut self.entries[id.0].binder;
            for value in values {
                binder.store(value, Source::Env);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> ParseResult<Matches> {
        self.apply_env()?;
        let index = self.index();

        for &id in index.positionals() {
            let entry = &self.entries[id.0];
            if entry.def.required && !entry.binder.is_explicit() {
                return Err(UsageError::new(
                    UsageErrorKind::MissingRequiredOperand,
                    entry.def.display_name(),
                )
                .with_option(entry.def.name.clone())
                .into());
            }
        }
        for &id in index.named() {
            let entry = &self.entries[id.0];
            if entry.def.required && entry.binder.source() == Source::Default {
                return Err(UsageError::new(
                    UsageErrorKind::MissingRequiredOption,
                    entry.def.display_name(),
                )
                .with_option(entry.def.name.clone())
                .into());
            }
        }

        let mut ids: Vec<OptionId> = index
            .named()
            .iter()
            .chain(index.positionals())
            .copied()
            .collect();
        ids.sort_by_key(|id| self.entries[id.0].def.order);
        let values: IndexMap<String, Binding> = ids
            .into_iter()
            .map(|id| {
                let entry = &self.entries[id.0];
                (
                    entry.def.name.clone(),
                    Binding {
                        id,
                        value: entry.binder.current().clone(),
                        source: entry.binder.source(),
                    },
                )
            })
            .collect();

        let scope = self.state.scope;
        let shadowed: Vec<Binding> = ancestry(self.commands, scope)
            .into_iter()
            .flat_map(|cmd| self.commands[cmd.0].options.iter().copied())
            .filter(|id| {
                let def = &self.entries[id.0].def;
                !def.positional && !index.named().contains(id)
            })
            .map(|id| Binding {
                id,
                value: self.entries[id.0].binder.current().clone(),
                source: self.entries[id.0].binder.source(),
            })
            .collect();

        Ok(Matches {
            command: scope,
            path: self.path,
            values,
            shadowed,
            unknown: self.unknown,
            raw: self.raw,
            action: self.commands[scope.0].action.clone(),
        })
    }
}

/// `5`, `2.5`, `.5`, `1e3`: the body of a negative number.
fn looks_numeric(body: &str) -> bool {
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.') && body.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_mode_depends_on_subcommands() {
        assert_eq!(Mode::initial(true), Mode::PreCommand);
        assert_eq!(Mode::initial(false), Mode::InCommandArgs);
    }

    #[test]
    fn options_before_a_subcommand_keep_pre_command() {
        assert_eq!(Mode::PreCommand.transition(Event::BindOption), Mode::PreCommand);
        assert_eq!(
            Mode::PreCommand.transition(Event::EnterCommand {
                has_subcommands: true
            }),
            Mode::PreCommand
        );
        assert_eq!(
            Mode::PreCommand.transition(Event::EnterCommand {
                has_subcommands: false
            }),
            Mode::InCommandArgs
        );
        assert_eq!(
            Mode::PreCommand.transition(Event::BindOperand { final_slot: false }),
            Mode::InCommandArgs
        );
    }

    #[test]
    fn sticky_modes_are_never_left() {
        let events = [
            Event::EnterCommand {
                has_subcommands: true,
            },
            Event::BindOption,
            Event::BindOperand { final_slot: false },
            Event::BindOperand { final_slot: true },
            Event::Unknown,
        ];
        for event in events {
            assert_eq!(Mode::InUnknownArgs.transition(event), Mode::InUnknownArgs);
            assert_eq!(Mode::OperandsOnly.transition(event), Mode::OperandsOnly);
        }
    }

    #[test]
    fn final_operand_and_unknown_enter_sticky_modes() {
        for mode in [Mode::PreCommand, Mode::InCommandArgs] {
            assert_eq!(
                mode.transition(Event::BindOperand { final_slot: true }),
                Mode::OperandsOnly
            );
            assert_eq!(mode.transition(Event::Unknown), Mode::InUnknownArgs);
        }
        assert_eq!(
            Mode::InCommandArgs.transition(Event::EnterCommand {
                has_subcommands: true
            }),
            Mode::InCommandArgs
        );
    }

    #[test]
    fn numeric_bodies() {
        assert!(looks_numeric("5"));
        assert!(looks_numeric("2.5"));
        assert!(looks_numeric(".5"));
        assert!(looks_numeric("1e3"));
        assert!(!looks_numeric("inf"));
        assert!(!looks_numeric("v"));
        assert!(!looks_numeric("5x"));
    }
}

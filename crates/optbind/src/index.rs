//! Per-scope name lookup.
//!
//! An [`OptIndex`] is built for every command whenever the registry changes,
//! so conflicts are reported by the registration call that introduced them.

use std::collections::HashMap;

use serde::Serialize;

use crate::def::OptionKind;
use crate::error::ConfigError;
use crate::registry::{Command, CommandId, Entry, OptionId};

/// How the operands of a scope end name-based parsing.
///
/// Ordered by priority: a higher classification found on any operand wins
/// over a lower one, and among equals the earliest operand wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalPrecedence {
    /// No operand, or only required scalar operands.
    Unset,
    /// An optional scalar operand exists.
    UnsetOptional,
    /// A variable-size operand exists.
    UnsetVariable,
    /// An optional operand is marked final.
    FinalOptional,
    /// A required operand is marked final.
    FinalRequired,
}

impl FinalPrecedence {
    fn classify(kind: OptionKind, required: bool, is_final: bool) -> Self {
        match (is_final, required, kind) {
            (true, true, _) => Self::FinalRequired,
            (true, false, _) => Self::FinalOptional,
            (false, _, OptionKind::Vector) => Self::UnsetVariable,
            (false, false, _) => Self::UnsetOptional,
            (false, true, _) => Self::Unset,
        }
    }

    /// Whether the precedence selects a final operand slot.
    pub fn selects_slot(self) -> bool {
        self >= Self::FinalOptional
    }
}

/// A name resolved to an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: OptionId,
    /// Spelled as `--no-<long>`.
    pub inverted: bool,
}

#[derive(Debug, Clone)]
pub struct OptIndex {
    scope: CommandId,
    short: HashMap<char, Resolved>,
    long: HashMap<String, Resolved>,
    named: Vec<OptionId>,
    positionals: Vec<OptionId>,
    min_required: usize,
    precedence: FinalPrecedence,
    final_slot: Option<usize>,
    digit_shorts: bool,
}

impl OptIndex {
    /// Merge the options of `scope` and its ancestors and check every
    /// per-scope invariant.
    pub(crate) fn build(
        entries: &[Entry],
        commands: &[Command],
        scope: CommandId,
    ) -> Result<Self, ConfigError> {
        let chain = ancestry(commands, scope);
        let command_name = commands[scope.0].name.as_str();

        // Option names shadowed by a deeper scope.
        let mut owner: HashMap<&str, usize> = HashMap::new();
        for (depth, cmd) in chain.iter().enumerate() {
            for id in &commands[cmd.0].options {
                let def = &entries[id.0].def;
                if !def.positional {
                    owner.insert(def.name.as_str(), depth);
                }
            }
        }

        let mut short: HashMap<char, (Resolved, usize)> = HashMap::new();
        let mut long: HashMap<String, (Resolved, usize)> = HashMap::new();
        let mut named = Vec::new();

        for (depth, cmd) in chain.iter().enumerate() {
            for &id in &commands[cmd.0].options {
                let def = &entries[id.0].def;
                if def.positional || owner.get(def.name.as_str()) != Some(&depth) {
                    continue;
                }
                named.push(id);

                let plain = Resolved {
                    id,
                    inverted: false,
                };
                for &c in &def.shorts {
                    if let Some((prev, prev_depth)) = short.insert(c, (plain, depth)) {
                        if prev_depth == depth {
                            return Err(ConfigError::DuplicateShort {
                                command: command_name.to_string(),
                                short: c,
                                first: entries[prev.id.0].def.name.clone(),
                                second: def.name.clone(),
                            });
                        }
                    }
                }

                let longs = def.effective_longs();
                let mut spellings: Vec<(String, Resolved)> =
                    longs.iter().map(|l| (l.clone(), plain)).collect();
                if def.invert {
                    spellings.extend(longs.iter().map(|l| {
                        (
                            format!("no-{l}"),
                            Resolved {
                                id,
                                inverted: true,
                            },
                        )
                    }));
                }
                for (spelling, resolved) in spellings {
                    if let Some((prev, prev_depth)) =
                        long.insert(spelling.clone(), (resolved, depth))
                    {
                        if prev_depth == depth {
                            return Err(ConfigError::DuplicateLong {
                                command: command_name.to_string(),
                                long: spelling,
                                first: entries[prev.id.0].def.name.clone(),
                                second: def.name.clone(),
                            });
                        }
                    }
                }
            }
        }
        named.sort_by_key(|id| entries[id.0].def.order);

        let positionals: Vec<OptionId> = commands[scope.0]
            .options
            .iter()
            .copied()
            .filter(|id| entries[id.0].def.positional)
            .collect();
        check_operands(entries, command_name, &positionals)?;

        let min_required = positionals
            .iter()
            .take_while(|id| entries[id.0].def.required)
            .count();

        let mut precedence = FinalPrecedence::Unset;
        let mut best_slot = None;
        for (slot, id) in positionals.iter().enumerate() {
            let def = &entries[id.0].def;
            let class = FinalPrecedence::classify(def.kind, def.required, def.is_final);
            if class > precedence {
                precedence = class;
                best_slot = Some(slot);
            }
        }
        let final_slot = best_slot.filter(|_| precedence.selects_slot());

        let digit_shorts = short.keys().any(|c| c.is_ascii_digit());

        Ok(Self {
            scope,
            short: short.into_iter().map(|(k, (r, _))| (k, r)).collect(),
            long: long.into_iter().map(|(k, (r, _))| (k, r)).collect(),
            named,
            positionals,
            min_required,
            precedence,
            final_slot,
            digit_shorts,
        })
    }

    pub fn scope(&self) -> CommandId {
        self.scope
    }

    pub fn short(&self, c: char) -> Option<Resolved> {
        self.short.get(&c).copied()
    }

    pub fn long(&self, name: &str) -> Option<Resolved> {
        self.long.get(name).copied()
    }

    /// Visible named options, in declaration order.
    pub fn named(&self) -> &[OptionId] {
        &self.named
    }

    /// Operand slots, in declaration order.
    pub fn positionals(&self) -> &[OptionId] {
        &self.positionals
    }

    /// Number of leading operands that must be supplied.
    pub fn min_required_operands(&self) -> usize {
        self.min_required
    }

    pub fn final_precedence(&self) -> FinalPrecedence {
        self.precedence
    }

    /// Operand slot after which every token is literal.
    pub fn final_slot(&self) -> Option<usize> {
        self.final_slot
    }

    /// Whether some short name is a digit, which disables negative-number operands.
    pub fn has_digit_shorts(&self) -> bool {
        self.digit_shorts
    }

    /// Resolve the option a token would name, without applying it.
    ///
    /// For a short cluster only the first character is looked up.
    pub fn resolve_token(&self, token: &str) -> Option<Resolved> {
        if let Some(rest) = token.strip_prefix("--") {
            let name = rest.split_once('=').map_or(rest, |(n, _)| n);
            return self.long(name);
        }
        let c = token.strip_prefix('-')?.chars().next()?;
        self.short(c)
    }
}

/// Root first, `scope` last.
pub(crate) fn ancestry(commands: &[Command], scope: CommandId) -> Vec<CommandId> {
    let mut chain = vec![scope];
    let mut cur = commands[scope.0].parent;
    while let Some(parent) = cur {
        chain.push(parent);
        cur = commands[parent.0].parent;
    }
    chain.reverse();
    chain
}

/// At most one variable-size operand, and no required operand after it
/// unless a final operand sits between them.
fn check_operands(
    entries: &[Entry],
    command: &str,
    positionals: &[OptionId],
) -> Result<(), ConfigError> {
    let mut variable: Option<&str> = None;
    let mut closed = false;

    for id in positionals {
        let def = &entries[id.0].def;
        closed |= variable.is_some() && def.is_final;
        if def.required && !closed {
            if let Some(previous) = variable {
                return Err(ConfigError::OperandOrder {
                    name: def.name.clone(),
                    previous: previous.to_string(),
                    after: "variable-size",
                });
            }
        }

        if def.kind == OptionKind::Vector {
            if let Some(first) = variable {
                return Err(ConfigError::MultipleVariableOperands {
                    command: command.to_string(),
                    first: first.to_string(),
                    second: def.name.clone(),
                });
            }
            variable = Some(def.name.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::OptionDef;
    use crate::registry::Registry;
    use crate::value::ValueType;

    fn precedence_of(defs: Vec<OptionDef>) -> (FinalPrecedence, Option<usize>) {
        let mut reg = Registry::new("t");
        for def in defs {
            reg.add(def).unwrap();
        }
        let index = reg.index(reg.root());
        (index.final_precedence(), index.final_slot())
    }

    #[test]
    fn precedence_levels_are_ordered() {
        use FinalPrecedence::*;
        assert!(Unset < UnsetOptional);
        assert!(UnsetOptional < UnsetVariable);
        assert!(UnsetVariable < FinalOptional);
        assert!(FinalOptional < FinalRequired);
    }

    #[test]
    fn precedence_without_final_markers() {
        assert_eq!(precedence_of(vec![]), (FinalPrecedence::Unset, None));
        assert_eq!(
            precedence_of(vec![OptionDef::operand("a", ValueType::String)]),
            (FinalPrecedence::Unset, None)
        );
        assert_eq!(
            precedence_of(vec![
                OptionDef::operand("a", ValueType::String),
                OptionDef::operand("b", ValueType::String).optional(),
            ]),
            (FinalPrecedence::UnsetOptional, None)
        );
        assert_eq!(
            precedence_of(vec![
                OptionDef::operand("a", ValueType::String).optional(),
                OptionDef::operand("b", ValueType::String).optional().many(),
            ]),
            (FinalPrecedence::UnsetVariable, None)
        );
    }

    #[test]
    fn required_final_beats_optional_final() {
        assert_eq!(
            precedence_of(vec![
                OptionDef::operand("cmd", ValueType::String).final_operand(),
                OptionDef::operand("args", ValueType::String)
                    .optional()
                    .many()
                    .final_operand(),
            ]),
            (FinalPrecedence::FinalRequired, Some(0))
        );
    }

    #[test]
    fn final_marker_beats_variable_operand() {
        assert_eq!(
            precedence_of(vec![
                OptionDef::operand("files", ValueType::String).optional().many(),
                OptionDef::operand("rest", ValueType::String)
                    .optional()
                    .final_operand(),
            ]),
            (FinalPrecedence::FinalOptional, Some(1))
        );
    }

    #[test]
    fn earliest_operand_wins_a_tie() {
        assert_eq!(
            precedence_of(vec![
                OptionDef::operand("a", ValueType::String).optional().final_operand(),
                OptionDef::operand("b", ValueType::String).optional().final_operand(),
            ]),
            (FinalPrecedence::FinalOptional, Some(0))
        );
    }

    #[test]
    fn counts_leading_required_operands() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::operand("src", ValueType::Path)).unwrap();
        reg.add(OptionDef::operand("dst", ValueType::Path)).unwrap();
        reg.add(OptionDef::operand("mode", ValueType::String).optional())
            .unwrap();
        assert_eq!(reg.index(reg.root()).min_required_operands(), 2);
    }

    #[test]
    fn synthesizes_inverted_names() {
        let mut reg = Registry::new("t");
        let id = reg
            .add(OptionDef::flag("color").long("color").invert())
            .unwrap();
        let index = reg.index(reg.root());
        assert_eq!(
            index.long("no-color"),
            Some(Resolved {
                id,
                inverted: true
            })
        );
        assert_eq!(index.resolve_token("--color=false").map(|r| r.id), Some(id));
    }

    #[test]
    fn rejects_inverted_name_collision() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::flag("color").long("color").invert())
            .unwrap();
        let err = reg.add(OptionDef::flag("nocolor").long("no-color")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateLong { .. }));
    }

    #[test]
    fn rejects_operand_layouts() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::operand("files", ValueType::Path).many())
            .unwrap();
        let err = reg
            .add(OptionDef::operand("dest", ValueType::Path))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OperandOrder { after: "variable-size", .. }));
        let err = reg
            .add(OptionDef::operand("more", ValueType::Path).optional().many())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MultipleVariableOperands { .. }));

        // Bounded or not, a vector counts as variable-size.
        let mut reg = Registry::new("t");
        reg.add(OptionDef::operand("pair", ValueType::Int).many().nargs(2))
            .unwrap();
        let err = reg
            .add(OptionDef::operand("dest", ValueType::Path))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OperandOrder { previous, .. } if previous == "pair"));
    }

    #[test]
    fn final_operand_lifts_the_vector_rule() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::operand("files", ValueType::Path).many())
            .unwrap();
        reg.add(OptionDef::operand("dest", ValueType::Path).final_operand())
            .unwrap();
        reg.add(OptionDef::operand("mode", ValueType::String))
            .unwrap();
        let index = reg.index(reg.root());
        assert_eq!(index.final_precedence(), FinalPrecedence::FinalRequired);
        assert_eq!(index.final_slot(), Some(1));
        assert_eq!(index.min_required_operands(), 3);
    }

    #[test]
    fn required_operand_may_follow_an_optional_one() {
        let mut reg = Registry::new("t");
        reg.add(OptionDef::operand("a", ValueType::String).optional())
            .unwrap();
        reg.add(OptionDef::operand("b", ValueType::String)).unwrap();
        assert_eq!(reg.index(reg.root()).min_required_operands(), 0);
    }

    #[test]
    fn local_options_shadow_inherited_ones() {
        let mut reg = Registry::new("t");
        let global = reg
            .add(OptionDef::flag("verbose").short('v').long("verbose"))
            .unwrap();
        let sub = reg.add_command(reg.root(), "run").unwrap();
        let local = reg
            .add_to(sub, OptionDef::single("vm", ValueType::String).short('v'))
            .unwrap();

        let index = reg.index(sub);
        assert_eq!(index.short('v').map(|r| r.id), Some(local));
        assert_eq!(index.long("verbose").map(|r| r.id), Some(global));
        assert_eq!(reg.index(reg.root()).short('v').map(|r| r.id), Some(global));
    }
}

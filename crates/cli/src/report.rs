use indexmap::IndexMap;
use optbind::{Binding, FinalPrecedence, Matches, RawValue, Registry};
use serde::Serialize;

/// Outcome of `optbind parse`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParseReport<'a> {
    pub command: &'a [String],
    pub values: &'a IndexMap<String, Binding>,
    pub unknown: &'a [String],
    pub raw: &'a [RawValue],
}

impl<'a> ParseReport<'a> {
    pub fn new(matches: &'a Matches) -> Self {
        Self {
            command: matches.command_path(),
            values: matches.values(),
            unknown: matches.unknown(),
            raw: matches.raw_values(),
        }
    }
}

/// What a schema registers in one command scope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScopeReport {
    pub path: Vec<String>,
    pub options: Vec<String>,
    pub operands: Vec<String>,
    pub subcommands: Vec<String>,
    pub min_required_operands: usize,
    pub final_precedence: FinalPrecedence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_operand: Option<String>,
}

pub fn scopes(reg: &Registry) -> Vec<ScopeReport> {
    reg.command_ids()
        .map(|id| {
            let index = reg.index(id);
            let operands: Vec<String> = index
                .positionals()
                .iter()
                .map(|&op| reg.def(op).name().to_string())
                .collect();
            ScopeReport {
                path: reg.command_path(id),
                options: index
                    .named()
                    .iter()
                    .map(|&op| reg.def(op).display_name())
                    .collect(),
                final_operand: index.final_slot().and_then(|slot| operands.get(slot).cloned()),
                operands,
                subcommands: reg
                    .subcommands(id)
                    .iter()
                    .map(|&child| reg.command_name(child).to_string())
                    .collect(),
                min_required_operands: index.min_required_operands(),
                final_precedence: index.final_precedence(),
            }
        })
        .collect()
}

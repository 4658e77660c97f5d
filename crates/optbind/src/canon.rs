//! Canonical serialization of bound values.
//!
//! Re-parsing the output of [`Registry::canonical_args`] binds the same
//! values, so it can be stored or logged and replayed later.

use crate::binder::Source;
use crate::def::{OptionDef, OptionKind};
use crate::index::ancestry;
use crate::matches::{Binding, Matches};
use crate::registry::Registry;
use crate::value::{Bound, Value};

impl Registry {
    /// Options given on the command line as `--name=value`, each placed
    /// before the name of the first subcommand below the scope that owns it,
    /// then `--` and the operands.
    pub fn canonical_args(&self, matches: &Matches) -> Vec<String> {
        let mut given: Vec<&Binding> = matches
            .values()
            .values()
            .chain(matches.shadowed())
            .filter(|binding| binding.source == Source::Argv)
            .collect();
        given.sort_by_key(|binding| self.def(binding.id).order);

        let mut out = Vec::new();
        for (depth, scope) in ancestry(&self.commands, matches.command()).into_iter().enumerate() {
            if depth > 0 {
                out.push(self.command_name(scope).to_string());
            }
            for binding in &given {
                let def = self.def(binding.id);
                if !def.is_positional() && self.entries[binding.id.0].scope == scope {
                    push_option(&mut out, def, &binding.value);
                }
            }
        }

        let index = self.index(matches.command());
        let mut operands = Vec::new();
        for (slot, &id) in index.positionals().iter().enumerate() {
            let Some(binding) = given.iter().find(|binding| binding.id == id) else {
                continue;
            };
            let values = binding.value.values();
            operands.extend(values.iter().map(Value::to_string));
            let closes = self.def(id).kind() == OptionKind::Vector
                && !values.is_empty()
                && index.final_slot().is_some_and(|f| f > slot);
            if closes {
                operands.push("--".to_string());
            }
        }
        if !operands.is_empty() {
            out.push("--".to_string());
            out.extend(operands);
        }
        out
    }
}

fn push_option(out: &mut Vec<String>, def: &OptionDef, value: &Bound) {
    let Some(spelling) = spelling(def) else {
        return;
    };
    match value {
        Bound::Scalar(Some(Value::Bool(on))) if def.kind() == OptionKind::Flag => {
            if *on {
                out.push(spelling);
            } else if let Some(long) = spelling.strip_prefix("--") {
                if def.is_invertible() {
                    out.push(format!("--no-{long}"));
                } else {
                    out.push(format!("{spelling}=false"));
                }
            }
        }
        Bound::Scalar(Some(value)) => attach(out, &spelling, value),
        Bound::Scalar(None) => out.push(spelling),
        Bound::Vector(values) if values.is_empty() => out.push(spelling),
        Bound::Vector(values) => {
            for value in values {
                attach(out, &spelling, value);
            }
        }
    }
}

/// The first long name, or the first short one.
fn spelling(def: &OptionDef) -> Option<String> {
    if let Some(long) = def.effective_longs().first() {
        return Some(format!("--{long}"));
    }
    def.shorts().first().map(|c| format!("-{c}"))
}

/// `--name=value`, `-s=value`, or `-s` followed by an empty value.
fn attach(out: &mut Vec<String>, spelling: &str, value: &Value) {
    let value = value.to_string();
    if value.is_empty() && !spelling.starts_with("--") {
        out.push(spelling.to_string());
        out.push(value);
    } else {
        out.push(format!("{spelling}={value}"));
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::Source;
    use crate::def::OptionDef;
    use crate::registry::Registry;
    use crate::value::{Bound, Value, ValueType};

    fn registry() -> Registry {
        let mut reg = Registry::new("tool");
        reg.add(OptionDef::flag("verbose").short('v')).unwrap();
        reg.add(OptionDef::flag("color").long("color").invert().default("true"))
            .unwrap();
        reg.add(OptionDef::single("level", ValueType::Int).short('l'))
            .unwrap();
        reg.add(OptionDef::single("sep", ValueType::Char).short('s'))
            .unwrap();
        reg.add(OptionDef::single("name", ValueType::String).short('n'))
            .unwrap();
        reg.add(
            OptionDef::vector("include", ValueType::Path)
                .short('I')
                .long("include"),
        )
        .unwrap();
        reg.add(OptionDef::operand("files", ValueType::String).many().optional())
            .unwrap();
        reg
    }

    fn snapshot(reg: &Registry) -> Vec<(String, Bound)> {
        reg.defs()
            .map(|(id, def)| (def.name().to_string(), reg.value(id).clone()))
            .collect()
    }

    #[test]
    fn canonical_form() {
        let mut reg = registry();
        let m = reg
            .parse(&["-vl", "3", "--no-color", "-I", "a", "-Ib", "x", "-s", ","])
            .unwrap();
        assert_eq!(
            reg.canonical_args(&m),
            vec![
                "-v",
                "--no-color",
                "-l=3",
                "-s=,",
                "--include=a",
                "--include=b",
                "--",
                "x",
            ]
        );
    }

    #[test]
    fn reparsing_canonical_args_binds_the_same_values() {
        let mut reg = registry();
        let m = reg
            .parse(&["x", "--include", "dir", "-l", "-4", "--", "-v", "-x"])
            .unwrap();
        let before = snapshot(&reg);
        let canonical = reg.canonical_args(&m);
        assert_eq!(
            canonical,
            vec!["--include=dir", "-l=-4", "--", "x", "-v", "-x"]
        );

        let m2 = reg.parse(canonical.as_slice()).unwrap();
        assert_eq!(snapshot(&reg), before);
        assert_eq!(reg.canonical_args(&m2), canonical);

        for (argv, expected) in [
            (vec!["-s", "=", "x"], vec!["-s==", "--", "x"]),
            (vec!["-n", "", "x"], vec!["-n", "", "--", "x"]),
        ] {
            let m = reg.parse(&argv).unwrap();
            let before = snapshot(&reg);
            let canonical = reg.canonical_args(&m);
            assert_eq!(canonical, expected);
            reg.parse(canonical.as_slice()).unwrap();
            assert_eq!(snapshot(&reg), before);
        }
    }

    #[test]
    fn shadowed_options_stay_before_the_subcommand() {
        let mut reg = Registry::new("tool");
        let global = reg.add(OptionDef::flag("verbose").short('v')).unwrap();
        let run = reg.add_command(reg.root(), "run").unwrap();
        let local = reg
            .add_to(run, OptionDef::single("verbose", ValueType::String))
            .unwrap();

        let m = reg.parse(&["-v", "run"]).unwrap();
        assert_eq!(m.source("verbose"), Some(Source::Default));
        assert_eq!(reg.canonical_args(&m), vec!["-v", "run"]);

        let m = reg.parse(&["-v", "run", "--verbose", "loud"]).unwrap();
        assert_eq!(m.get::<String>("verbose").as_deref(), Some("loud"));
        assert_eq!(m.shadowed().len(), 1);
        assert_eq!(m.shadowed()[0].id, global);
        assert_eq!(m.shadowed()[0].source, Source::Argv);

        let canonical = reg.canonical_args(&m);
        assert_eq!(canonical, vec!["-v", "run", "--verbose=loud"]);
        reg.parse(canonical.as_slice()).unwrap();
        assert_eq!(reg.value(global), &Bound::Scalar(Some(Value::Bool(true))));
        assert_eq!(reg.value(local), &Bound::Scalar(Some(Value::Str("loud".into()))));
    }

    #[test]
    fn double_dash_separates_a_vector_from_the_final_operand() {
        let mut reg = Registry::new("cp");
        reg.add(OptionDef::operand("files", ValueType::String).many())
            .unwrap();
        reg.add(OptionDef::operand("dest", ValueType::String).final_operand())
            .unwrap();

        let m = reg.parse(&["a", "b", "--", "out"]).unwrap();
        let before = snapshot(&reg);
        let canonical = reg.canonical_args(&m);
        assert_eq!(canonical, vec!["--", "a", "b", "--", "out"]);
        reg.parse(canonical.as_slice()).unwrap();
        assert_eq!(snapshot(&reg), before);
    }

    #[test]
    fn defaults_are_left_out() {
        let mut reg = registry();
        let m = reg.parse::<&str>(&[]).unwrap();
        assert!(reg.canonical_args(&m).is_empty());
    }
}

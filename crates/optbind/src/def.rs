//! Option and operand definitions.

use crate::error::ConfigError;
use crate::value::{Bound, Value, ValueType};

/// How many values an option binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    /// Boolean, no value token.
    Flag,
    /// Exactly one value.
    Single,
    /// Zero or more values, appended per occurrence.
    Vector,
}

/// `nargs` value meaning "no cap".
pub const UNBOUNDED: i32 = -1;

/// A named option or a positional operand.
///
/// Built with the constructor for its kind and chained setters:
///
/// ```
/// use optbind::{OptionDef, ValueType};
///
/// let verbose = OptionDef::flag("verbose").short('v').long("verbose").invert();
/// let level = OptionDef::single("level", ValueType::Int).short('l').default("1");
/// let files = OptionDef::operand("files", ValueType::Path).many();
/// # let _ = (verbose, level, files);
/// ```
#[derive(Debug, Clone)]
pub struct OptionDef {
    pub(crate) name: String,
    pub(crate) shorts: Vec<char>,
    pub(crate) longs: Vec<String>,
    pub(crate) kind: OptionKind,
    pub(crate) value_type: ValueType,
    pub(crate) defaults: Vec<String>,
    pub(crate) implicit: Option<String>,
    pub(crate) invert: bool,
    pub(crate) optional_value: bool,
    pub(crate) nargs: i32,
    pub(crate) is_final: bool,
    pub(crate) positional: bool,
    pub(crate) required: bool,
    pub(crate) env: Option<String>,
    pub(crate) choices: Vec<String>,
    pub(crate) group: u32,
    pub(crate) order: usize,
}

impl OptionDef {
    fn new(name: impl Into<String>, kind: OptionKind, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            shorts: Vec::new(),
            longs: Vec::new(),
            kind,
            value_type,
            defaults: Vec::new(),
            implicit: None,
            invert: false,
            optional_value: false,
            nargs: if kind == OptionKind::Vector { 1 } else { 0 },
            is_final: false,
            positional: false,
            required: false,
            env: None,
            choices: Vec::new(),
            group: 0,
            order: 0,
        }
    }

    /// A boolean flag. Without names it is spelled `--<name>`.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Flag, ValueType::Bool)
    }

    /// An option taking exactly one value.
    pub fn single(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, OptionKind::Single, value_type)
    }

    /// An option accumulating values; each occurrence takes up to `nargs` (default 1).
    pub fn vector(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, OptionKind::Vector, value_type)
    }

    /// A positional operand, bound by declaration order. Required unless
    /// [`optional`](Self::optional) is set.
    pub fn operand(name: impl Into<String>, value_type: ValueType) -> Self {
        let mut def = Self::new(name, OptionKind::Single, value_type);
        def.positional = true;
        def.required = true;
        def
    }

    pub fn short(mut self, c: char) -> Self {
        if !self.shorts.contains(&c) {
            self.shorts.push(c);
        }
        self
    }

    /// Add a long name. Leading dashes are ignored.
    pub fn long(mut self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref().trim().trim_start_matches('-').to_string();
        if !self.longs.contains(&name) {
            self.longs.push(name);
        }
        self
    }

    /// Turn an operand into a variable-size one (unbounded unless [`nargs`](Self::nargs) is set).
    pub fn many(mut self) -> Self {
        if self.kind != OptionKind::Vector {
            self.kind = OptionKind::Vector;
            self.nargs = if self.positional { UNBOUNDED } else { 1 };
        }
        self
    }

    /// Default value; call repeatedly for vector defaults.
    pub fn default(mut self, raw: impl Into<String>) -> Self {
        self.defaults.push(raw.into());
        self
    }

    /// Expose `--no-<long>` spellings that set the flag to false.
    pub fn invert(mut self) -> Self {
        self.invert = true;
        self
    }

    /// The value may be omitted; `implicit` (or the default) is used then.
    pub fn optional_value(mut self) -> Self {
        self.optional_value = true;
        self
    }

    /// Value used when an optional-value option appears without one.
    pub fn implicit(mut self, raw: impl Into<String>) -> Self {
        self.optional_value = true;
        self.implicit = Some(raw.into());
        self
    }

    /// Per-occurrence value cap for vectors; [`UNBOUNDED`] for no cap.
    pub fn nargs(mut self, nargs: i32) -> Self {
        self.nargs = nargs;
        self
    }

    /// Once this operand starts binding, everything after it is an operand.
    pub fn final_operand(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Environment variable consulted when the option is absent from argv.
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env = Some(var.into());
        self
    }

    /// Restrict accepted raw values.
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Help group. Has no effect on parsing.
    pub fn group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn shorts(&self) -> &[char] {
        &self.shorts
    }

    pub fn longs(&self) -> &[String] {
        &self.longs
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_invertible(&self) -> bool {
        self.invert
    }

    pub fn takes_optional_value(&self) -> bool {
        self.optional_value
    }

    pub fn nargs_cap(&self) -> Option<usize> {
        usize::try_from(self.nargs).ok()
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn group_id(&self) -> u32 {
        self.group
    }

    /// Declaration order within the registry.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Spelling used in diagnostics: the first long name, else the first short one.
    pub fn display_name(&self) -> String {
        if self.positional {
            return format!("<{}>", self.name);
        }
        if let Some(long) = self.longs.first() {
            return format!("--{long}");
        }
        match self.shorts.first() {
            Some(c) => format!("-{c}"),
            None => format!("--{}", self.name),
        }
    }

    /// Long names once defaults are applied: a named option without any
    /// spelling answers to `--<name>`.
    pub(crate) fn effective_longs(&self) -> Vec<String> {
        if self.positional || !self.longs.is_empty() || !self.shorts.is_empty() {
            self.longs.clone()
        } else {
            vec![self.name.clone()]
        }
    }

    /// Convert the declared defaults.
    pub(crate) fn default_bound(&self) -> Result<Bound, ConfigError> {
        let convert = |raw: &String| -> Result<Value, ConfigError> {
            self.convert(raw).map_err(|reason| ConfigError::InvalidDefault {
                name: self.name.clone(),
                value: raw.clone(),
                reason,
            })
        };
        match self.kind {
            OptionKind::Vector => Ok(Bound::Vector(
                self.defaults.iter().map(convert).collect::<Result<_, _>>()?,
            )),
            OptionKind::Flag => match self.defaults.last() {
                Some(raw) => Ok(Bound::Scalar(Some(convert(raw)?))),
                None => Ok(Bound::Scalar(Some(Value::Bool(false)))),
            },
            OptionKind::Single => Ok(Bound::Scalar(
                self.defaults.last().map(convert).transpose()?,
            )),
        }
    }

    /// Raw text to value, honouring `choices`.
    pub(crate) fn convert(&self, raw: &str) -> Result<Value, String> {
        if !self.choices.is_empty() && !self.choices.iter().any(|c| c == raw) {
            return Err(format!("possible values: {}", self.choices.join(", ")));
        }
        self.value_type.parse(raw)
    }

    /// Checks that only involve this definition.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidName {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        for c in &self.shorts {
            if c.is_whitespace() || *c == '-' || *c == '=' {
                return Err(invalid("short names must be a visible character other than '-' or '='"));
            }
        }
        for long in &self.longs {
            if long.is_empty() || long.contains('=') || long.chars().any(char::is_whitespace) {
                return Err(invalid("long names must be non-empty without '=' or whitespace"));
            }
        }

        let combination = |reason| ConfigError::InvalidCombination {
            name: self.name.clone(),
            reason,
        };
        if self.invert && self.kind != OptionKind::Flag {
            return Err(ConfigError::InvertOnNonFlag {
                name: self.name.clone(),
            });
        }
        if self.positional {
            if !self.shorts.is_empty() || !self.longs.is_empty() {
                return Err(combination("operands cannot have option names"));
            }
            if self.kind == OptionKind::Flag {
                return Err(combination("operands cannot be flags"));
            }
            if self.optional_value || self.env.is_some() {
                return Err(combination("operands cannot have optional values or env fallbacks"));
            }
        } else if self.is_final {
            return Err(combination("only operands can be final"));
        }
        if self.kind == OptionKind::Flag && self.optional_value {
            return Err(combination("flags never take a value"));
        }
        if self.kind != OptionKind::Vector && self.nargs != 0 {
            return Err(combination("nargs only applies to vectors"));
        }
        if self.kind == OptionKind::Vector && (self.nargs == 0 || self.nargs < UNBOUNDED) {
            return Err(combination("nargs must be positive or -1"));
        }
        if self.value_type != ValueType::Bool && self.kind == OptionKind::Flag {
            return Err(combination("flags are boolean"));
        }
        if self.kind == OptionKind::Single && self.defaults.len() > 1 {
            return Err(combination("only vectors take several defaults"));
        }
        if let Some(implicit) = &self.implicit {
            self.convert(implicit)
                .map_err(|reason| ConfigError::InvalidDefault {
                    name: self.name.clone(),
                    value: implicit.clone(),
                    reason,
                })?;
        }
        self.default_bound().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_requires_a_flag() {
        let def = OptionDef::single("level", ValueType::Int).long("level").invert();
        assert_eq!(
            def.validate(),
            Err(ConfigError::InvertOnNonFlag {
                name: "level".to_string()
            })
        );
        assert!(OptionDef::flag("color").long("color").invert().validate().is_ok());
    }

    #[test]
    fn defaults_are_checked_at_registration() {
        let def = OptionDef::single("count", ValueType::UInt).default("-3");
        assert!(matches!(
            def.validate(),
            Err(ConfigError::InvalidDefault { .. })
        ));
        let def = OptionDef::single("mode", ValueType::String)
            .choices(["fast", "slow"])
            .default("medium");
        assert!(matches!(
            def.validate(),
            Err(ConfigError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn rejects_bad_combinations() {
        assert!(OptionDef::single("x", ValueType::Int).nargs(2).validate().is_err());
        assert!(OptionDef::vector("x", ValueType::Int).nargs(0).validate().is_err());
        assert!(OptionDef::vector("x", ValueType::Int).nargs(-2).validate().is_err());
        assert!(OptionDef::operand("x", ValueType::Int).short('x').validate().is_err());
        assert!(OptionDef::single("x", ValueType::Int).final_operand().validate().is_err());
        assert!(OptionDef::single("x", ValueType::Int).long("a=b").validate().is_err());
        assert!(OptionDef::flag("").validate().is_err());
    }

    #[test]
    fn display_name_prefers_long() {
        let def = OptionDef::vector("char", ValueType::Char).short('c').long("char");
        assert_eq!(def.display_name(), "--char");
        assert_eq!(OptionDef::single("i", ValueType::Int).short('i').display_name(), "-i");
        assert_eq!(OptionDef::operand("numbers", ValueType::Float).display_name(), "<numbers>");
        assert_eq!(OptionDef::flag("dry-run").effective_longs(), vec!["dry-run".to_string()]);
    }

    #[test]
    fn vector_operands_are_unbounded() {
        let def = OptionDef::operand("numbers", ValueType::Float).many();
        assert_eq!(def.nargs_cap(), None);
        assert_eq!(OptionDef::vector("c", ValueType::Char).nargs_cap(), Some(1));
    }
}

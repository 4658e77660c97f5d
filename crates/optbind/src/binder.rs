//! Per-option value storage.
//!
//! Every option owns a [`Binder`] inside the registry. A binder can also
//! forward its state to caller-supplied storage (a [`Shared`] variable) after
//! each parse, so callers may either read [`Matches`](crate::Matches) or keep
//! plain typed variables.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::def::{OptionDef, OptionKind};
use crate::value::{Bindable, Bound, Value};

/// Caller-owned storage an option writes into.
pub type Shared<T> = Rc<RefCell<T>>;

/// Create caller-owned storage holding `value`.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Type-erased receiver of a binder's state.
pub(crate) trait Sink {
    fn publish(&self, bound: &Bound);
}

impl<T: Bindable> Sink for RefCell<T> {
    fn publish(&self, bound: &Bound) {
        if let Some(value) = T::from_bound(bound) {
            *self.borrow_mut() = value;
        }
    }
}

/// Where the current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Default,
    Env,
    Argv,
}

pub(crate) struct Binder {
    kind: OptionKind,
    default: Bound,
    current: Bound,
    source: Source,
    sink: Option<Rc<dyn Sink>>,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("current", &self.current)
            .field("source", &self.source)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Binder {
    /// `default` must already be converted (see `OptionDef::default_bound`).
    pub(crate) fn new(def: &OptionDef, default: Bound) -> Self {
        Self {
            kind: def.kind,
            current: default.clone(),
            default,
            source: Source::Default,
            sink: None,
        }
    }

    pub(crate) fn attach(&mut self, sink: Rc<dyn Sink>) {
        self.sink = Some(sink);
    }

    pub(crate) fn current(&self) -> &Bound {
        &self.current
    }

    pub(crate) fn source(&self) -> Source {
        self.source
    }

    pub(crate) fn is_explicit(&self) -> bool {
        self.source == Source::Argv
    }

    /// Store a converted value. The first value of an invocation replaces the
    /// defaults of a vector; later ones append.
    pub(crate) fn store(&mut self, value: Value, source: Source) {
        match self.kind {
            OptionKind::Vector => {
                let fresh = self.source != source;
                match &mut self.current {
                    Bound::Vector(values) if !fresh => values.push(value),
                    other => *other = Bound::Vector(vec![value]),
                }
            }
            OptionKind::Flag | OptionKind::Single => self.current = Bound::Scalar(Some(value)),
        }
        self.source = source;
    }

    /// Mark the option as given on the command line without changing its value.
    pub(crate) fn touch(&mut self) {
        if self.source != Source::Argv && self.kind == OptionKind::Vector {
            self.current = Bound::Vector(Vec::new());
        }
        self.source = Source::Argv;
    }

    /// Back to the declared default.
    pub(crate) fn reset(&mut self) {
        self.current = self.default.clone();
        self.source = Source::Default;
    }

    pub(crate) fn publish(&self) {
        if let Some(sink) = &self.sink {
            sink.publish(&self.current);
        }
    }
}

//! Single-pass command-line option binding.
//!
//! Options and operands are registered on a [`Registry`], optionally bound to
//! caller-owned variables, and grouped into a tree of command scopes. A parse
//! walks the argument vector once, left to right, and writes typed values into
//! the bound variables:
//!
//! ```
//! use optbind::{OptionDef, Registry, ValueType, shared};
//!
//! let level = shared(0i64);
//! let mut reg = Registry::new("tool");
//! reg.bind(reg.root(), OptionDef::single("level", ValueType::Int).short('l'), &level)?;
//! reg.add(OptionDef::operand("input", ValueType::Path))?;
//!
//! let matches = reg.parse(&["-l", "3", "in.txt"])?;
//! assert_eq!(*level.borrow(), 3);
//! assert_eq!(matches.get::<std::path::PathBuf>("input").unwrap().to_str(), Some("in.txt"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Arguments of the form `@path` are replaced by the words of the file at
//! `path` before parsing (see [`ParserConfig`]).

mod binder;
mod canon;
mod config;
mod def;
mod dispatch;
mod error;
mod index;
mod matches;
mod parser;
mod reader;
mod registry;
mod value;

pub use binder::{Shared, Source, shared};
pub use config::{DEFAULT_MAX_RESPONSE_DEPTH, ParserConfig};
pub use def::{OptionDef, OptionKind, UNBOUNDED};
pub use error::{
    ConfigError, ErrorKind, ParseError, ParseResult, ResponseFileError, UsageError, UsageErrorKind,
};
pub use index::{FinalPrecedence, OptIndex, Resolved};
pub use matches::{Binding, Matches, RawKind, RawValue};
pub use parser::{Event, Mode};
pub use reader::{FsSource, ResponseSource, Token, expand};
pub use registry::{Action, CommandId, OptionId, Registry};
pub use value::{Bindable, Bound, FromValue, Value, ValueType};

// CLCore: Reader and Closure Engine for an Embedded Common Lisp Runtime
// This module exports the reader, lambda-list compiler, closure binder and
// the minimal evaluator they share.

pub mod types;
pub mod symbol;
pub mod conditions;
pub mod context;
pub mod readtable;
pub mod streams;
pub mod reader;
pub mod printer;
pub mod lambda_list;
pub mod closure;
pub mod eval;
pub mod process;
pub mod numbers;
pub mod primitives;

pub use closure::{Closure, ClosureKind};
pub use conditions::{ConditionKind, LispError, LispResult};
pub use context::GlobalContext;
pub use eval::{DynamicExtent, Environment, Evaluator, Interpreter};
pub use lambda_list::{Arity, LambdaList, Parameter, ParameterKind};
pub use process::Process;
pub use reader::{read_all, read_from_string, DispatchPolicy, Reader, ReaderOptions};
pub use streams::{BufReadSource, CharSource, CharacterInputStream, EofPolicy, StringSource};
pub use types::Value;

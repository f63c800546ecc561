pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod source;
pub mod value;

pub use error::{ErrorKind, LangError, LangResult};
pub use interpreter::{Interpreter, InterpreterOptions};
pub use module::Module;
pub use value::Value;

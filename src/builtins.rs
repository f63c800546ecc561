//! Built-in function registry.

use std::collections::HashMap;
use std::rc::Rc;

use crate::{
    error::{Arity, ErrorKind, LangError, LangResult},
    interpreter::Interpreter,
    value::Value,
};

pub type BuiltinFn = dyn Fn(&Interpreter, &[Value]) -> LangResult<Value>;

pub struct BuiltinFunction {
    pub name: String,
    /// Parameter names, for documentation.
    pub params: Vec<String>,
    pub arity: Arity,
    pub func: Rc<BuiltinFn>,
}

impl BuiltinFunction {
    pub fn new(
        name: &str,
        params: &[&str],
        arity: Arity,
        func: impl Fn(&Interpreter, &[Value]) -> LangResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            arity,
            func: Rc::new(func),
        }
    }
}

impl Clone for BuiltinFunction {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            arity: self.arity,
            func: Rc::clone(&self.func),
        }
    }
}

impl std::fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<builtin {}({})>", self.name, self.params.join(", "))
    }
}

#[derive(Default)]
pub struct BuiltinRegistry {
    functions: HashMap<String, Rc<BuiltinFunction>>,
}

impl BuiltinRegistry {
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.install_standard();
        registry
    }

    pub fn register(&mut self, builtin: BuiltinFunction) {
        self.functions
            .insert(builtin.name.clone(), Rc::new(builtin));
    }

    pub fn get(&self, name: &str) -> Option<Rc<BuiltinFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn install_standard(&mut self) {
        self.register(BuiltinFunction::new(
            "out",
            &["output"],
            Arity::Exact(1),
            |interpreter, args| {
                interpreter.write_line(&args[0].to_string())?;
                Ok(Value::Absent)
            },
        ));

        self.register(BuiltinFunction::new(
            "value",
            &["number"],
            Arity::Exact(1),
            |_, args| Ok(Value::Number(number_arg("value", args, 0)?.abs())),
        ));

        self.register(BuiltinFunction::new(
            "in",
            &["message"],
            Arity::Exact(1),
            |interpreter, args| {
                interpreter.write_line(&args[0].to_string())?;
                Ok(Value::String(interpreter.read_line()?))
            },
        ));

        self.register(BuiltinFunction::new(
            "random",
            &["start", "end"],
            Arity::Exact(2),
            |interpreter, args| {
                // Integers in [start, end); fractional bounds round up.
                let start = number_arg("random", args, 0)?.ceil() as i64;
                let end = number_arg("random", args, 1)?.ceil() as i64;
                if start >= end {
                    return Err(failure(
                        "random",
                        format!("empty range [{}, {})", start, end),
                    ));
                }
                Ok(Value::Number(interpreter.random_between(start, end) as f64))
            },
        ));

        self.register(BuiltinFunction::new(
            "min",
            &["values"],
            Arity::AtLeast(1),
            |_, args| extremum("min", args, f64::min),
        ));

        self.register(BuiltinFunction::new(
            "max",
            &["values"],
            Arity::AtLeast(1),
            |_, args| extremum("max", args, f64::max),
        ));

        self.register(BuiltinFunction::new(
            "round",
            &["number"],
            Arity::Exact(1),
            |_, args| Ok(Value::Number(number_arg("round", args, 0)?.round())),
        ));

        self.register(BuiltinFunction::new(
            "pow",
            &["base", "exp"],
            Arity::Exact(2),
            |_, args| {
                let base = number_arg("pow", args, 0)?;
                let exp = number_arg("pow", args, 1)?;
                Ok(Value::Number(base.powf(exp)))
            },
        ));

        self.register(BuiltinFunction::new("quit", &[], Arity::Exact(0), |_, _| {
            Err(LangError::new(ErrorKind::Halt))
        }));

        self.register(BuiltinFunction::new(
            "len",
            &["text"],
            Arity::Exact(1),
            |_, args| match &args[0] {
                Value::String(text) => Ok(Value::Number(text.chars().count() as f64)),
                other => Err(LangError::new(ErrorKind::TypeMismatch(format!(
                    "'len' expects a string, found {}",
                    other.kind_name()
                )))),
            },
        ));
    }
}

fn failure(name: &str, message: String) -> LangError {
    LangError::new(ErrorKind::BuiltinFailure {
        name: name.to_string(),
        message,
    })
}

fn number_arg(name: &str, args: &[Value], index: usize) -> LangResult<f64> {
    let arg = args
        .get(index)
        .ok_or_else(|| failure(name, format!("missing argument {}", index + 1)))?;
    arg.as_number().ok_or_else(|| {
        LangError::new(ErrorKind::TypeMismatch(format!(
            "'{}' expects a number for argument {}, found {}",
            name,
            index + 1,
            arg.kind_name()
        )))
    })
}

fn extremum(name: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> LangResult<Value> {
    let mut result = number_arg(name, args, 0)?;
    for index in 1..args.len() {
        result = pick(result, number_arg(name, args, index)?);
    }
    Ok(Value::Number(result))
}

use std::{
    cell::RefCell,
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    ast::{BinaryOperator, Expression, Postfix, Statement, StatementKind},
    builtins::{BuiltinFunction, BuiltinRegistry},
    environment::Environment,
    error::{ErrorKind, LangError, LangResult},
    module::{FunctionDef, Module},
    parser::Parser,
    source::SourceBuffer,
    value::Value,
};

pub const SOURCE_EXTENSION: &str = "ipl";
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Directories searched by `import` after the importing file's own directory.
    pub search_paths: Vec<PathBuf>,
    pub max_call_depth: usize,
    /// Fixed seed for `random`; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            seed: None,
        }
    }
}

/// How a block finished.
enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

/// Pops the pushed entry when dropped, on success and on error alike.
struct StackGuard<'a, T> {
    stack: &'a RefCell<Vec<T>>,
}

impl<'a, T> StackGuard<'a, T> {
    fn push(stack: &'a RefCell<Vec<T>>, entry: T) -> Self {
        stack.borrow_mut().push(entry);
        Self { stack }
    }
}

impl<T> Drop for StackGuard<'_, T> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}


pub struct Interpreter {
    options: InterpreterOptions,
    builtins: BuiltinRegistry,
    output: RefCell<Box<dyn Write>>,
    input: RefCell<Box<dyn BufRead>>,
    rng: RefCell<StdRng>,
    call_stack: RefCell<Vec<String>>,
    loading: RefCell<Vec<PathBuf>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            options,
            builtins: BuiltinRegistry::standard(),
            output: RefCell::new(Box::new(io::stdout())),
            input: RefCell::new(Box::new(io::BufReader::new(io::stdin()))),
            rng: RefCell::new(rng),
            call_stack: RefCell::new(Vec::new()),
            loading: RefCell::new(Vec::new()),
        }
    }

    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = RefCell::new(Box::new(output));
        self
    }

    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.input = RefCell::new(Box::new(input));
        self
    }

    pub fn register_builtin(&mut self, builtin: BuiltinFunction) {
        self.builtins.register(builtin);
    }

    /// Reads, parses and runs a source file as the top-level module.
    pub fn run_file(&self, path: &Path) -> LangResult<Rc<Module>> {
        let source = fs::read_to_string(path)?;
        self.run_source(&source, module_id(path))
    }

    /// Runs `source` as the top-level module. A `quit()` anywhere in the run,
    /// imports included, ends it successfully.
    pub fn run_source(&self, source: &str, file: impl Into<PathBuf>) -> LangResult<Rc<Module>> {
        let module = self.load(source, file.into())?;
        match self.execute(&module) {
            Err(err) if err.is_halt() => {
                tracing::debug!(module = %module.id().display(), "halted by quit");
                Ok(module)
            }
            result => result.map(|()| module),
        }
    }

    fn load(&self, source: &str, file: PathBuf) -> LangResult<Rc<Module>> {
        let buffer = SourceBuffer::new(source, file.clone());
        let program = Parser::new(&buffer).parse_program()?;
        Ok(Rc::new(Module::new(file, buffer, program)))
    }

    fn execute(&self, module: &Module) -> LangResult<()> {
        let _loading = StackGuard::push(&self.loading, module.id().to_path_buf());
        // A top-level `return` only ends this module.
        self.exec_block(module, &module.program().statements, module.globals())?;
        Ok(())
    }

    /// Calls `name` as if from the top level of `module`.
    pub fn call_function(&self, module: &Module, name: &str, args: Vec<Value>) -> LangResult<Value> {
        if let Some(def) = module.function(name) {
            return self.invoke(module, &def, args);
        }
        if let Some(builtin) = self.builtins.get(name) {
            if !builtin.arity.accepts(args.len()) {
                return Err(LangError::new(ErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: builtin.arity,
                    found: args.len(),
                }));
            }
            return (builtin.func)(self, &args);
        }
        Err(LangError::new(ErrorKind::UndefinedFunction(name.to_string())))
    }

    fn invoke(&self, caller: &Module, def: &FunctionDef, args: Vec<Value>) -> LangResult<Value> {
        // Functions run inside the module that defined them.
        let routed: Rc<Module>;
        let module: &Module = if def.module.as_path() == caller.id() {
            caller
        } else {
            routed = caller
                .find_module(&def.module)
                .ok_or_else(|| LangError::new(ErrorKind::UndefinedFunction(def.name().to_string())))?;
            &*routed
        };

        if !def.arity().accepts(args.len()) {
            return Err(LangError::new(ErrorKind::ArityMismatch {
                name: def.name().to_string(),
                expected: def.arity(),
                found: args.len(),
            }));
        }

        let depth = self.call_stack.borrow().len();
        if depth >= self.options.max_call_depth {
            return Err(LangError::new(ErrorKind::CallDepthExceeded(
                self.options.max_call_depth,
            )));
        }
        let _frame = StackGuard::push(&self.call_stack, def.name().to_string());
        tracing::trace!(
            function = def.name(),
            module = %module.id().display(),
            depth = depth + 1,
            "call"
        );

        let frame = Environment::with_bindings(def.params().iter().zip(args));
        ensure_sufficient_stack(|| -> LangResult<Value> {
            match self.exec_block(module, &def.decl.body, &frame)? {
                Flow::Return(value) => Ok(value),
                Flow::Next | Flow::Break | Flow::Continue => Ok(Value::Absent),
            }
        })
    }

    fn exec_block(&self, module: &Module, block: &[Statement], env: &Environment) -> LangResult<Flow> {
        for statement in block {
            let flow = self
                .exec_statement(module, statement, env)
                .map_err(|err| err.or_at(|| module.location(statement.line)))?;
            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    fn exec_statement(&self, module: &Module, statement: &Statement, env: &Environment) -> LangResult<Flow> {
        match &statement.kind {
            StatementKind::Assign { name, expr } => {
                let value = self.eval_expression(module, expr, env)?;
                env.set(name.as_str(), value);
            }
            StatementKind::Expression(expr) => {
                self.eval_expression(module, expr, env)?;
            }
            StatementKind::If { branches, otherwise } => {
                for branch in branches {
                    if self.eval_condition(module, &branch.condition, env)? {
                        return self.exec_block(module, &branch.body, env);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(module, body, env);
                }
            }
            StatementKind::While { condition, body } => {
                while self.eval_condition(module, condition, env)? {
                    match self.exec_block(module, body, env)? {
                        Flow::Break => break,
                        Flow::Next | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StatementKind::Def(decl) => module.define_function(Rc::clone(decl)),
            StatementKind::Import(target) => self.import(module, target)?,
            StatementKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expression(module, expr, env)?,
                    None => Value::Absent,
                };
                return Ok(Flow::Return(value));
            }
            StatementKind::Break => return Ok(Flow::Break),
            StatementKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Next)
    }

    fn eval_condition(&self, module: &Module, condition: &Expression, env: &Environment) -> LangResult<bool> {
        match self.eval_expression(module, condition, env)? {
            Value::Boolean(b) => Ok(b),
            other => Err(LangError::new(ErrorKind::TypeMismatch(format!(
                "condition '{}' must be boolean, found {}",
                condition.text,
                other.kind_name()
            )))),
        }
    }

    fn eval_expression(&self, module: &Module, expr: &Expression, env: &Environment) -> LangResult<Value> {
        let mut stack: Vec<Value> = Vec::new();
        let imbalance = || {
            LangError::new(ErrorKind::MalformedExpression(format!(
                "'{}' does not reduce to a single value",
                expr.text
            )))
        };

        for item in expr.postfix()? {
            let value = match item {
                Postfix::Number(n) => Value::Number(*n),
                Postfix::String(s) => Value::String(s.clone()),
                Postfix::Boolean(b) => Value::Boolean(*b),
                Postfix::Variable(name) => env
                    .get(name)
                    .ok_or_else(|| LangError::new(ErrorKind::UndefinedVariable(name.clone())))?,
                Postfix::Call { name, args } => {
                    let values = args
                        .iter()
                        .map(|arg| self.eval_expression(module, arg, env))
                        .collect::<LangResult<Vec<_>>>()?;
                    self.call_function(module, name, values)?
                }
                Postfix::Operator(op) => {
                    let right = stack.pop().ok_or_else(imbalance)?;
                    let left = stack.pop().ok_or_else(imbalance)?;
                    self.eval_binary(*op, left, right)?
                }
            };
            stack.push(value);
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => Ok(value),
            _ => Err(imbalance()),
        }
    }

    fn eval_binary(&self, op: BinaryOperator, left: Value, right: Value) -> LangResult<Value> {
        match op {
            BinaryOperator::Add => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Number(l + r))
            }
            BinaryOperator::Sub => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Number(l - r))
            }
            BinaryOperator::Mul => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Number(l * r))
            }
            BinaryOperator::Div => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Number(l / r))
            }
            BinaryOperator::LessThan => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Boolean(l < r))
            }
            BinaryOperator::LessThanEq => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Boolean(l <= r))
            }
            BinaryOperator::GreaterThan => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Boolean(l > r))
            }
            BinaryOperator::GreaterThanEq => {
                let (l, r) = self.expect_numbers(op, left, right)?;
                Ok(Value::Boolean(l >= r))
            }
            BinaryOperator::Eq => self.eval_equality(op, left, right).map(Value::Boolean),
            BinaryOperator::NotEq => self
                .eval_equality(op, left, right)
                .map(|equal| Value::Boolean(!equal)),
            BinaryOperator::And | BinaryOperator::Or => self.eval_logical(op, left, right),
        }
    }

    fn expect_numbers(&self, op: BinaryOperator, left: Value, right: Value) -> LangResult<(f64, f64)> {
        match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(mismatch(op, "numbers", &left, &right)),
        }
    }

    fn eval_equality(&self, op: BinaryOperator, left: Value, right: Value) -> LangResult<bool> {
        if std::mem::discriminant(&left) != std::mem::discriminant(&right) {
            return Err(mismatch(op, "operands of the same kind", &left, &right));
        }
        Ok(left == right)
    }

    fn eval_logical(&self, op: BinaryOperator, left: Value, right: Value) -> LangResult<Value> {
        match (left.as_bool(), right.as_bool()) {
            (Some(l), Some(r)) => Ok(Value::Boolean(if op == BinaryOperator::And {
                l && r
            } else {
                l || r
            })),
            _ => Err(mismatch(op, "booleans", &left, &right)),
        }
    }

    fn import(&self, importer: &Module, target: &str) -> LangResult<()> {
        let path = self.resolve_import(importer, target)?;

        {
            let loading = self.loading.borrow();
            if loading.contains(&path) {
                let chain = loading
                    .iter()
                    .chain(std::iter::once(&path))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(LangError::new(ErrorKind::ImportCycle(chain)));
            }
        }

        tracing::debug!(
            importer = %importer.id().display(),
            module = %path.display(),
            "importing module"
        );
        let source = fs::read_to_string(&path)?;
        let child = self.load(&source, path)?;
        self.execute(&child)?;
        tracing::debug!(
            module = %child.id().display(),
            functions = child.function_names().len(),
            variables = child.globals().len(),
            "linking module"
        );
        importer.link(child);
        Ok(())
    }

    fn resolve_import(&self, importer: &Module, target: &str) -> LangResult<PathBuf> {
        let name = target.trim().trim_matches(|c| c == '"' || c == '\'');
        let mut relative = PathBuf::from(name);
        if relative.extension().is_none() {
            relative.set_extension(SOURCE_EXTENSION);
        }

        let base_dir = importer
            .id()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        std::iter::once(base_dir)
            .chain(self.options.search_paths.iter().cloned())
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file())
            .map(|found| module_id(&found))
            .ok_or_else(|| LangError::new(ErrorKind::ModuleNotFound(name.to_string())))
    }

    pub(crate) fn write_line(&self, text: &str) -> LangResult<()> {
        let mut output = self.output.borrow_mut();
        writeln!(output, "{}", text)?;
        output.flush()?;
        Ok(())
    }

    pub(crate) fn read_line(&self) -> LangResult<String> {
        let mut line = String::new();
        self.input.borrow_mut().read_line(&mut line)?;
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    pub(crate) fn random_between(&self, start: i64, end: i64) -> i64 {
        self.rng.borrow_mut().gen_range(start..end)
    }
}

fn mismatch(op: BinaryOperator, expected: &str, left: &Value, right: &Value) -> LangError {
    LangError::new(ErrorKind::TypeMismatch(format!(
        "'{}' expects {}, found {} and {}",
        op,
        expected,
        left.kind_name(),
        right.kind_name()
    )))
}

/// Remaining native stack below which a call frame moves to a fresh segment.
const RED_ZONE: usize = 100 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f` with enough native stack for one more level of script recursion.
#[cfg(not(target_arch = "wasm32"))]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(target_arch = "wasm32")]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Canonical identifier of a module file, falling back to the path as given.
fn module_id(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

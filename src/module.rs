//! Module instances and the function table they link together.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::{
    ast::{FunctionDecl, Program},
    environment::Environment,
    error::{Arity, Location},
    source::SourceBuffer,
    value::Value,
};

/// A user function together with the module that defined it.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub decl: Rc<FunctionDecl>,
    pub module: PathBuf,
}

impl FunctionDef {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn params(&self) -> &[String] {
        &self.decl.params
    }

    pub fn arity(&self) -> Arity {
        Arity::Exact(self.decl.params.len())
    }
}

pub struct Module {
    id: PathBuf,
    source: SourceBuffer,
    program: Program,
    globals: Environment,
    functions: RefCell<HashMap<String, Rc<FunctionDef>>>,
    imports: RefCell<HashMap<PathBuf, Rc<Module>>>,
}

impl Module {
    pub fn new(id: PathBuf, source: SourceBuffer, program: Program) -> Self {
        Self {
            id,
            source,
            program,
            globals: Environment::new(),
            functions: RefCell::new(HashMap::new()),
            imports: RefCell::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &Path {
        &self.id
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Value of a top-level variable.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    pub fn function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.borrow().get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn define_function(&self, decl: Rc<FunctionDecl>) {
        let def = FunctionDef {
            decl,
            module: self.id.clone(),
        };
        self.functions
            .borrow_mut()
            .insert(def.name().to_string(), Rc::new(def));
    }

    /// Merges an executed child module into this one. Functions and variables of
    /// the child replace same-named entries; the child is kept for call routing.
    pub fn link(&self, child: Rc<Module>) {
        {
            let incoming = child.functions.borrow();
            let mut functions = self.functions.borrow_mut();
            for (name, def) in incoming.iter() {
                functions.insert(name.clone(), Rc::clone(def));
            }
        }
        self.globals.merge_from(&child.globals);
        self.imports
            .borrow_mut()
            .insert(child.id.clone(), Rc::clone(&child));
    }

    /// Finds an imported module instance anywhere below this one.
    pub fn find_module(&self, id: &Path) -> Option<Rc<Module>> {
        let imports = self.imports.borrow();
        if let Some(module) = imports.get(id) {
            return Some(Rc::clone(module));
        }
        imports.values().find_map(|child| child.find_module(id))
    }

    pub fn location(&self, line: usize) -> Location {
        self.source.location(line)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("globals", &self.globals.names())
            .field("functions", &self.function_names())
            .finish()
    }
}

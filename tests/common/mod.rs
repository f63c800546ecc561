#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use ipl_lang::{Interpreter, InterpreterOptions, LangResult, Module};

/// Writer that keeps everything written to it for later inspection.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs a script file with a fixed seed, returning the result and captured output.
pub fn run_file(path: &Path) -> (LangResult<Rc<Module>>, String) {
    let buffer = SharedBuffer::default();
    let interpreter = Interpreter::with_options(InterpreterOptions {
        seed: Some(1),
        ..InterpreterOptions::default()
    })
    .with_output(buffer.clone())
    .with_input(io::empty());
    let result = interpreter.run_file(path);
    (result, buffer.contents())
}

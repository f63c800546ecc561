use std::cell::RefCell;
use std::collections::HashMap;

use crate::value::Value;

/// Variable bindings of one module or one function call.
#[derive(Debug, Default)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A call frame holding only the given parameter bindings.
    pub fn with_bindings<'a>(bindings: impl IntoIterator<Item = (&'a String, Value)>) -> Self {
        let values = bindings
            .into_iter()
            .map(|(name, value)| (name.clone(), value))
            .collect();
        Self {
            values: RefCell::new(values),
        }
    }

    /// Binds `name`, replacing any previous value.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Copies every binding of `other` into this environment; `other` wins on conflicts.
    pub fn merge_from(&self, other: &Environment) {
        let incoming = other.values.borrow();
        let mut values = self.values.borrow_mut();
        for (name, value) in incoming.iter() {
            values.insert(name.clone(), value.clone());
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let env = Environment::new();
        env.set("x", Value::Number(1.0));
        env.set("x", Value::Boolean(true));
        assert_eq!(env.get("x"), Some(Value::Boolean(true)));
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn merge_overwrites_existing_names() {
        let importer = Environment::new();
        importer.set("a", Value::Number(1.0));
        importer.set("b", Value::Number(2.0));

        let child = Environment::new();
        child.set("b", Value::Number(20.0));
        child.set("c", Value::Number(30.0));

        importer.merge_from(&child);
        assert_eq!(importer.names(), vec!["a", "b", "c"]);
        assert_eq!(importer.get("b"), Some(Value::Number(20.0)));
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn frames_start_with_parameters_only() {
        let params = vec!["n".to_string(), "m".to_string()];
        let frame = Environment::with_bindings(
            params
                .iter()
                .zip(vec![Value::Number(5.0), Value::Absent]),
        );
        assert_eq!(frame.names(), vec!["m", "n"]);
        assert!(frame.contains("n"));
    }
}

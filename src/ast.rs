use std::cell::OnceCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::compiler;
use crate::error::LangResult;

#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    /// Index of the statement's line in the module's source buffer.
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Assign {
        name: String,
        expr: Expression,
    },
    Expression(Expression),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Statement>>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Def(Rc<FunctionDecl>),
    Import(String),
    Return(Option<Expression>),
    Break,
    Continue,
}

/// One `if`/`elif` arm.
#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    /// Half-open range of source buffer indices covered by the body.
    pub lines: Range<usize>,
}

/// Expression source text plus its postfix form, compiled on first use.
#[derive(Debug, Clone)]
pub struct Expression {
    pub text: String,
    compiled: OnceCell<Vec<Postfix>>,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            compiled: OnceCell::new(),
        }
    }

    pub(crate) fn precompiled(text: impl Into<String>, postfix: Vec<Postfix>) -> Self {
        Self {
            text: text.into(),
            compiled: OnceCell::from(postfix),
        }
    }

    pub fn postfix(&self) -> LangResult<&[Postfix]> {
        if let Some(items) = self.compiled.get() {
            return Ok(items);
        }
        let items = compiler::compile(&self.text)?;
        Ok(self.compiled.get_or_init(|| items))
    }
}

/// A compiled expression item in evaluation order.
#[derive(Debug, Clone)]
pub enum Postfix {
    Number(f64),
    String(String),
    Boolean(bool),
    Variable(String),
    Call { name: String, args: Vec<Expression> },
    Operator(BinaryOperator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,
    And,
    Or,
}

impl BinaryOperator {
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanEq
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanEq => 3,
            BinaryOperator::Add | BinaryOperator::Sub => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEq => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEq => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

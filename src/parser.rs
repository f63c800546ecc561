//! Block tracker: turns the indentation structure of a source buffer into a
//! statement tree.

use std::rc::Rc;

use crate::{
    ast::{Branch, Expression, FunctionDecl, Program, Statement, StatementKind},
    error::{ErrorKind, LangError, LangResult},
    source::{SourceBuffer, SourceLine},
};

const RESERVED_WORDS: &[&str] = &[
    "if", "elif", "else", "while", "break", "continue", "def", "return", "import", "and", "or",
    "true", "false",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Normal,
    If,
    Elif,
    Else,
    While,
    Function,
}

enum Header {
    Root,
    If(Expression),
    Elif(Expression),
    Else,
    While(Expression),
    Function { name: String, params: Vec<String> },
}

impl Header {
    fn kind(&self) -> BlockKind {
        match self {
            Header::Root => BlockKind::Normal,
            Header::If(_) => BlockKind::If,
            Header::Elif(_) => BlockKind::Elif,
            Header::Else => BlockKind::Else,
            Header::While(_) => BlockKind::While,
            Header::Function { .. } => BlockKind::Function,
        }
    }
}

struct BlockFrame {
    header: Header,
    indent: usize,
    /// Source index of the line that opened the block.
    line: usize,
    statements: Vec<Statement>,
    /// Indentation of a just-closed `if` that an `elif`/`else` may still extend.
    open_if: Option<usize>,
}

impl BlockFrame {
    fn new(header: Header, indent: usize, line: usize) -> Self {
        Self {
            header,
            indent,
            line,
            statements: Vec::new(),
            open_if: None,
        }
    }

    fn kind(&self) -> BlockKind {
        self.header.kind()
    }

    fn push(&mut self, statement: Statement) {
        self.open_if = None;
        self.statements.push(statement);
    }
}

pub struct Parser<'a> {
    source: &'a SourceBuffer,
    frames: Vec<BlockFrame>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a SourceBuffer) -> Self {
        Self {
            source,
            frames: vec![BlockFrame::new(Header::Root, 0, 0)],
        }
    }

    fn malformed(&self, line: usize, msg: String) -> LangError {
        LangError::new(ErrorKind::MalformedStatement(msg)).or_at(|| self.source.location(line))
    }

    pub fn parse_program(mut self) -> LangResult<Program> {
        let source = self.source;
        for (index, line) in source.iter() {
            self.close_blocks(line.indent, index)?;
            self.dispatch(index, line)?;
        }
        self.close_blocks(0, source.len())?;

        let statements = self
            .frames
            .pop()
            .map(|root| root.statements)
            .unwrap_or_default();
        tracing::debug!(
            file = %self.source.file().display(),
            statements = statements.len(),
            "parsed module"
        );
        Ok(Program { statements })
    }

    fn top(&mut self) -> &mut BlockFrame {
        // The root frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Closes every open block whose indentation is at least `indent`.
    /// `end` is the source index the closed bodies stop at.
    fn close_blocks(&mut self, indent: usize, end: usize) -> LangResult<()> {
        while let Some(top) = self.frames.last() {
            if top.kind() == BlockKind::Normal || top.indent < indent {
                break;
            }
            if let Some(frame) = self.frames.pop() {
                self.close(frame, end)?;
            }
        }
        Ok(())
    }

    fn close(&mut self, frame: BlockFrame, end: usize) -> LangResult<()> {
        if frame.statements.is_empty() {
            let text = self
                .source
                .get(frame.line)
                .map(|l| l.text.clone())
                .unwrap_or_default();
            return Err(self.malformed(
                frame.line,
                format!("expected an indented block after '{}'", text),
            ));
        }

        let line = frame.line;
        let indent = frame.indent;
        let body = frame.statements;
        match frame.header {
            Header::Root => unreachable!("the root block is never closed"),
            Header::If(condition) => {
                let parent = self.top();
                parent.push(Statement {
                    kind: StatementKind::If {
                        branches: vec![Branch { condition, body }],
                        otherwise: None,
                    },
                    line,
                });
                parent.open_if = Some(indent);
            }
            Header::Elif(condition) => {
                let parent = self.top();
                match parent.statements.last_mut() {
                    Some(Statement {
                        kind: StatementKind::If { branches, .. },
                        ..
                    }) => branches.push(Branch { condition, body }),
                    _ => return Err(self.malformed(line, "'elif' without a matching 'if'".into())),
                }
                self.top().open_if = Some(indent);
            }
            Header::Else => {
                let parent = self.top();
                match parent.statements.last_mut() {
                    Some(Statement {
                        kind: StatementKind::If { otherwise, .. },
                        ..
                    }) => *otherwise = Some(body),
                    _ => return Err(self.malformed(line, "'else' without a matching 'if'".into())),
                }
                self.top().open_if = None;
            }
            Header::While(condition) => self.top().push(Statement {
                kind: StatementKind::While { condition, body },
                line,
            }),
            Header::Function { name, params } => self.top().push(Statement {
                kind: StatementKind::Def(Rc::new(FunctionDecl {
                    name,
                    params,
                    body,
                    lines: line + 1..end,
                })),
                line,
            }),
        }
        Ok(())
    }

    fn open(&mut self, header: Header, indent: usize, line: usize) {
        if !matches!(header, Header::Elif(_) | Header::Else) {
            self.top().open_if = None;
        }
        self.frames.push(BlockFrame::new(header, indent, line));
    }

    fn push(&mut self, kind: StatementKind, line: usize) {
        self.top().push(Statement { kind, line });
    }

    fn dispatch(&mut self, index: usize, line: &SourceLine) -> LangResult<()> {
        let (keyword, rest) = split_keyword(&line.text);
        match keyword {
            Some("if") => {
                let condition = self.condition(index, "if", rest)?;
                self.open(Header::If(condition), line.indent, index);
            }
            Some("elif") => {
                self.expect_open_if(index, line.indent, "elif")?;
                let condition = self.condition(index, "elif", rest)?;
                self.open(Header::Elif(condition), line.indent, index);
            }
            Some("else") => {
                if !rest.is_empty() {
                    return Err(self.malformed(index, format!("unexpected '{}' after 'else'", rest)));
                }
                self.expect_open_if(index, line.indent, "else")?;
                self.open(Header::Else, line.indent, index);
            }
            Some("while") => {
                let condition = self.condition(index, "while", rest)?;
                self.open(Header::While(condition), line.indent, index);
            }
            Some("def") => {
                self.reject_inside_function(index, "def")?;
                let (name, params) = self.parse_def_header(index, rest)?;
                self.open(Header::Function { name, params }, line.indent, index);
            }
            Some("import") => {
                self.reject_inside_function(index, "import")?;
                if rest.is_empty() {
                    return Err(self.malformed(index, "expected a module path after 'import'".into()));
                }
                self.push(StatementKind::Import(rest.to_string()), index);
            }
            Some("return") => {
                let expr = (!rest.is_empty()).then(|| Expression::new(rest));
                self.push(StatementKind::Return(expr), index);
            }
            Some(word @ ("break" | "continue")) => {
                if !rest.is_empty() {
                    return Err(self.malformed(index, format!("unexpected '{}' after '{}'", rest, word)));
                }
                self.require_loop(index, word)?;
                let kind = if word == "break" {
                    StatementKind::Break
                } else {
                    StatementKind::Continue
                };
                self.push(kind, index);
            }
            _ => match find_assignment(&line.text) {
                Some(position) => {
                    let name = line.text[..position].trim();
                    let expr = line.text[position + 1..].trim();
                    if !is_identifier(name) {
                        return Err(self.malformed(
                            index,
                            format!("cannot assign to '{}'", name),
                        ));
                    }
                    if expr.is_empty() {
                        return Err(self.malformed(
                            index,
                            format!("missing value in assignment to '{}'", name),
                        ));
                    }
                    self.push(
                        StatementKind::Assign {
                            name: name.to_string(),
                            expr: Expression::new(expr),
                        },
                        index,
                    );
                }
                None => self.push(StatementKind::Expression(Expression::new(line.text.as_str())), index),
            },
        }
        Ok(())
    }

    fn condition(&self, index: usize, keyword: &str, rest: &str) -> LangResult<Expression> {
        if rest.is_empty() {
            return Err(self.malformed(index, format!("missing condition after '{}'", keyword)));
        }
        Ok(Expression::new(rest))
    }

    fn expect_open_if(&self, index: usize, indent: usize, keyword: &str) -> LangResult<()> {
        match self.frames.last() {
            Some(frame) if frame.open_if == Some(indent) => Ok(()),
            _ => Err(self.malformed(index, format!("'{}' without a matching 'if'", keyword))),
        }
    }

    fn reject_inside_function(&self, index: usize, keyword: &str) -> LangResult<()> {
        if self.frames.iter().any(|f| f.kind() == BlockKind::Function) {
            return Err(self.malformed(
                index,
                format!("'{}' is only allowed outside function bodies", keyword),
            ));
        }
        Ok(())
    }

    fn require_loop(&self, index: usize, keyword: &str) -> LangResult<()> {
        for frame in self.frames.iter().rev() {
            match frame.kind() {
                BlockKind::While => return Ok(()),
                BlockKind::Function | BlockKind::Normal => break,
                _ => {}
            }
        }
        Err(self.malformed(index, format!("'{}' outside of a loop", keyword)))
    }

    fn parse_def_header(&self, index: usize, header: &str) -> LangResult<(String, Vec<String>)> {
        let malformed_header =
            || self.malformed(index, format!("expected 'def name(params)', found 'def {}'", header));

        let open = header.find('(').ok_or_else(malformed_header)?;
        let name = header[..open].trim();
        let inner = header[open + 1..]
            .trim_end()
            .strip_suffix(')')
            .ok_or_else(malformed_header)?;
        if !is_identifier(name) {
            return Err(self.malformed(index, format!("invalid function name '{}'", name)));
        }

        let mut params: Vec<String> = Vec::new();
        if !inner.trim().is_empty() {
            for param in inner.split(',').map(str::trim) {
                if !is_identifier(param) {
                    return Err(self.malformed(
                        index,
                        format!("invalid parameter '{}' in function '{}'", param, name),
                    ));
                }
                if params.iter().any(|p| p == param) {
                    return Err(self.malformed(
                        index,
                        format!("duplicate parameter '{}' in function '{}'", param, name),
                    ));
                }
                params.push(param.to_string());
            }
        }
        Ok((name.to_string(), params))
    }
}

/// Splits a leading statement keyword from the rest of the line.
fn split_keyword(text: &str) -> (Option<&str>, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let (word, rest) = text.split_at(end);
    let is_keyword = matches!(
        word,
        "if" | "elif" | "else" | "while" | "def" | "import" | "return" | "break" | "continue"
    );
    if is_keyword && (rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '('))
    {
        (Some(word), rest.trim())
    } else {
        (None, text)
    }
}

/// Byte offset of the first `=` that is not part of a comparison operator.
fn find_assignment(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(open) if b == open => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'=' => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let in_operator = matches!(prev, Some(b'=' | b'!' | b'<' | b'>'))
                    || next == Some(b'=');
                if !in_operator {
                    return Some(i);
                }
            }
            None => {}
        }
    }
    None
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}

//! Expression compiler: infix tokens to postfix order (shunting-yard).

use crate::ast::{BinaryOperator, Expression, Postfix};
use crate::error::{ErrorKind, LangError, LangResult};
use crate::lexer::{Lexer, TokenKind};

enum Pending {
    Operator(BinaryOperator),
    /// Byte offset of the `(` in the expression text.
    OpenParen(usize),
}

pub fn compile(text: &str) -> LangResult<Vec<Postfix>> {
    let tokens = Lexer::new(text).lex()?;
    if tokens.is_empty() {
        return Err(LangError::new(ErrorKind::MalformedExpression(
            "expected an expression".to_string(),
        )));
    }

    let unmatched = |offset: usize| {
        LangError::new(ErrorKind::UnmatchedParenthesis(format!(
            "at column {} in '{}'",
            offset + 1,
            text
        )))
    };
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Pending> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::Number(n) => output.push(Postfix::Number(n)),
            TokenKind::StringLiteral(s) => output.push(Postfix::String(s)),
            TokenKind::Boolean(b) => output.push(Postfix::Boolean(b)),
            TokenKind::Identifier(name) => output.push(Postfix::Variable(name)),
            TokenKind::Call { name, args } => {
                let args = split_arguments(&args)?
                    .into_iter()
                    .map(|arg| -> LangResult<Expression> {
                        Ok(Expression::precompiled(arg.trim(), compile(arg)?))
                    })
                    .collect::<LangResult<Vec<_>>>()?;
                output.push(Postfix::Call { name, args });
            }
            TokenKind::Operator(op) => {
                while let Some(Pending::Operator(top)) = stack.last() {
                    if top.precedence() >= op.precedence() {
                        output.push(Postfix::Operator(*top));
                        stack.pop();
                    } else {
                        break;
                    }
                }
                stack.push(Pending::Operator(op));
            }
            TokenKind::LParen => stack.push(Pending::OpenParen(token.span.start)),
            TokenKind::RParen => loop {
                match stack.pop() {
                    Some(Pending::Operator(op)) => output.push(Postfix::Operator(op)),
                    Some(Pending::OpenParen(_)) => break,
                    None => return Err(unmatched(token.span.start)),
                }
            },
        }
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Operator(op) => output.push(Postfix::Operator(op)),
            Pending::OpenParen(offset) => return Err(unmatched(offset)),
        }
    }

    Ok(output)
}

/// Splits call arguments on commas that are not nested in parentheses or quotes.
fn split_arguments(args: &str) -> LangResult<Vec<&str>> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, ch) in args.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&args[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);

    if parts.iter().any(|part| part.trim().is_empty()) {
        return Err(LangError::new(ErrorKind::MalformedExpression(format!(
            "empty argument in '({})'",
            args
        ))));
    }
    Ok(parts)
}

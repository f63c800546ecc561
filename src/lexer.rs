use crate::ast::BinaryOperator;
use crate::error::{ErrorKind, LangError, LangResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: std::ops::Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    StringLiteral(String),
    Boolean(bool),
    Identifier(String),
    Operator(BinaryOperator),
    /// `name(...)` with the raw text between the outer parentheses.
    Call { name: String, args: String },
    LParen,
    RParen,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::str::Chars<'a>,
    current_index: usize,
    next_index: usize,
    peeked: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars(),
            current_index: 0,
            next_index: 0,
            peeked: None,
        }
    }

    fn unknown_token(&self, text: impl Into<String>) -> LangError {
        LangError::new(ErrorKind::UnknownToken(text.into()))
    }

    pub fn lex(mut self) -> LangResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.consume_whitespace();
                continue;
            }

            let start = self.current_index;
            let kind = match ch {
                'a'..='z' | 'A'..='Z' | '_' => self.read_word()?,
                '0'..='9' => self.read_number()?,
                '"' | '\'' => TokenKind::StringLiteral(self.read_string(ch)?),
                '(' => {
                    self.advance_char();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance_char();
                    TokenKind::RParen
                }
                '+' => self.single(BinaryOperator::Add),
                '-' => self.single(BinaryOperator::Sub),
                '*' => self.single(BinaryOperator::Mul),
                '/' => self.single(BinaryOperator::Div),
                '<' => self.with_optional_eq(BinaryOperator::LessThan, BinaryOperator::LessThanEq),
                '>' => self.with_optional_eq(
                    BinaryOperator::GreaterThan,
                    BinaryOperator::GreaterThanEq,
                ),
                '=' | '!' => {
                    self.advance_char();
                    if matches!(self.peek_char(), Some('=')) {
                        self.advance_char();
                        if ch == '=' {
                            TokenKind::Operator(BinaryOperator::Eq)
                        } else {
                            TokenKind::Operator(BinaryOperator::NotEq)
                        }
                    } else {
                        return Err(self.unknown_token(ch.to_string()));
                    }
                }
                _ => return Err(self.unknown_token(ch.to_string())),
            };

            tokens.push(Token {
                kind,
                span: start..self.current_index,
            });
        }

        Ok(tokens)
    }

    fn single(&mut self, op: BinaryOperator) -> TokenKind {
        self.advance_char();
        TokenKind::Operator(op)
    }

    fn with_optional_eq(&mut self, plain: BinaryOperator, with_eq: BinaryOperator) -> TokenKind {
        self.advance_char();
        if matches!(self.peek_char(), Some('=')) {
            self.advance_char();
            TokenKind::Operator(with_eq)
        } else {
            TokenKind::Operator(plain)
        }
    }

    fn consume_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> LangResult<TokenKind> {
        let mut word = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }

        let kind = match word.as_str() {
            "and" => TokenKind::Operator(BinaryOperator::And),
            "or" => TokenKind::Operator(BinaryOperator::Or),
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            _ => {
                let rest = &self.input[self.current_index..];
                if rest.trim_start().starts_with('(') {
                    self.consume_whitespace();
                    self.advance_char(); // consume '('
                    let args = self.read_call_arguments()?;
                    TokenKind::Call { name: word, args }
                } else {
                    TokenKind::Identifier(word)
                }
            }
        };
        Ok(kind)
    }

    /// Reads up to the parenthesis closing the call, which is consumed but not returned.
    fn read_call_arguments(&mut self) -> LangResult<String> {
        let start = self.current_index;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(ch) = self.peek_char() {
            match (quote, ch) {
                (Some(open), c) if c == open => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(ch),
                (None, '(') => depth += 1,
                (None, ')') if depth == 0 => {
                    let args = self.input[start..self.current_index].to_string();
                    self.advance_char();
                    return Ok(args);
                }
                (None, ')') => depth -= 1,
                _ => {}
            }
            self.advance_char();
        }

        // `start` sits just past the call's '('.
        Err(LangError::new(ErrorKind::UnmatchedParenthesis(format!(
            "at column {} in '{}'",
            start,
            self.input
        ))))
    }

    fn read_number(&mut self) -> LangResult<TokenKind> {
        let mut number = String::new();
        let mut seen_dot = false;

        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance_char();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                number.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }

        if number.ends_with('.') {
            return Err(self.unknown_token(number));
        }
        number
            .parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.unknown_token(number))
    }

    fn read_string(&mut self, quote: char) -> LangResult<String> {
        self.advance_char(); // consume opening quote
        let mut content = String::new();

        while let Some(ch) = self.advance_char() {
            if ch == quote {
                return Ok(content);
            }
            content.push(ch);
        }

        Err(LangError::new(ErrorKind::MalformedExpression(
            "unterminated string literal".to_string(),
        )))
    }

    fn peek_char(&mut self) -> Option<char> {
        if let Some(ch) = self.peeked {
            Some(ch)
        } else {
            self.peeked = self.chars.next();
            if let Some(ch) = self.peeked {
                self.next_index = self.current_index + ch.len_utf8();
            }
            self.peeked
        }
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char();
        if let Some(actual) = ch {
            self.current_index = self.next_index;
            self.peeked = None;
            Some(actual)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .lex()
            .expect("input should lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn operators_do_not_need_spaces() {
        assert_eq!(
            kinds("a<=2*(b-1)"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(BinaryOperator::LessThanEq),
                TokenKind::Number(2.0),
                TokenKind::Operator(BinaryOperator::Mul),
                TokenKind::LParen,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Operator(BinaryOperator::Sub),
                TokenKind::Number(1.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn keywords_become_operators_and_booleans() {
        assert_eq!(
            kinds("true and x or false"),
            vec![
                TokenKind::Boolean(true),
                TokenKind::Operator(BinaryOperator::And),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Operator(BinaryOperator::Or),
                TokenKind::Boolean(false),
            ]
        );
    }

    #[test]
    fn call_keeps_raw_argument_text() {
        assert_eq!(
            kinds("max(a, min(1, 2)) + 3.5"),
            vec![
                TokenKind::Call {
                    name: "max".to_string(),
                    args: "a, min(1, 2)".to_string(),
                },
                TokenKind::Operator(BinaryOperator::Add),
                TokenKind::Number(3.5),
            ]
        );
    }

    #[test]
    fn call_name_may_be_followed_by_space() {
        assert_eq!(
            kinds("out (\"a)b\")"),
            vec![TokenKind::Call {
                name: "out".to_string(),
                args: "\"a)b\"".to_string(),
            }]
        );
    }

    #[test]
    fn strings_accept_both_quote_styles() {
        assert_eq!(
            kinds("'it' == \"it\""),
            vec![
                TokenKind::StringLiteral("it".to_string()),
                TokenKind::Operator(BinaryOperator::Eq),
                TokenKind::StringLiteral("it".to_string()),
            ]
        );
    }

    #[test]
    fn unclosed_call_is_unmatched_parenthesis() {
        let err = Lexer::new("pow(2, 3").lex().expect_err("should fail");
        assert!(matches!(err.kind, ErrorKind::UnmatchedParenthesis(_)));
    }

    #[test]
    fn stray_characters_are_unknown_tokens() {
        for input in ["a = b", "1, 2", "x ! y", "4 % 2", "3."] {
            let err = Lexer::new(input).lex().expect_err("should fail");
            assert!(
                matches!(err.kind, ErrorKind::UnknownToken(_)),
                "{} gave {:?}",
                input,
                err
            );
        }
    }
}

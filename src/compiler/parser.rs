//! SECL expression parsing.
//!
//! This module provides tokenization and parsing of macro expressions into
//! the syntax tree defined in [`crate::ast`]. Every token carries its source
//! position so that errors can point at the offending column.

use crate::ast::{ArrayLit, CmpOp, Expr, LogicalOp, MacroAst, Primary, PrimaryKind};
use crate::config::{CompilerConfig, DEFAULT_MAX_NESTING_DEPTH};
use crate::error::{Position, Result, SeclError};

/// Tokens in a SECL expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Pattern(String),
    Regex(String),
    True,
    False,
    And,
    Or,
    Not,
    In,
    NotIn,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Int(value) => format!("integer `{value}`"),
            Token::Str(value) => format!("string \"{value}\""),
            Token::Pattern(value) => format!("pattern ~\"{value}\""),
            Token::Regex(value) => format!("regex r\"{value}\""),
            Token::True => "`true`".to_string(),
            Token::False => "`false`".to_string(),
            Token::And => "`&&`".to_string(),
            Token::Or => "`||`".to_string(),
            Token::Not => "`!`".to_string(),
            Token::In => "`in`".to_string(),
            Token::NotIn => "`notin`".to_string(),
            Token::Eq => "`==`".to_string(),
            Token::Ne => "`!=`".to_string(),
            Token::Lt => "`<`".to_string(),
            Token::Le => "`<=`".to_string(),
            Token::Gt => "`>`".to_string(),
            Token::Ge => "`>=`".to_string(),
            Token::Match => "`=~`".to_string(),
            Token::NotMatch => "`!~`".to_string(),
            Token::LeftParen => "`(`".to_string(),
            Token::RightParen => "`)`".to_string(),
            Token::LeftBracket => "`[`".to_string(),
            Token::RightBracket => "`]`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }

    fn comparison(&self) -> Option<CmpOp> {
        match self {
            Token::Eq => Some(CmpOp::Eq),
            Token::Ne => Some(CmpOp::Ne),
            Token::Lt => Some(CmpOp::Lt),
            Token::Le => Some(CmpOp::Le),
            Token::Gt => Some(CmpOp::Gt),
            Token::Ge => Some(CmpOp::Ge),
            Token::Match => Some(CmpOp::Match),
            Token::NotMatch => Some(CmpOp::NotMatch),
            Token::In => Some(CmpOp::In),
            Token::NotIn => Some(CmpOp::NotIn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) pos: Position,
}

fn parse_error(pos: Position, message: impl Into<String>) -> SeclError {
    SeclError::Parse {
        pos,
        message: message.into(),
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            line: 1,
            column: 1,
        }
    }

    fn position(&mut self) -> Position {
        let offset = self
            .chars
            .peek()
            .map(|&(offset, _)| offset)
            .unwrap_or(self.source.len());
        Position::new(offset, self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Reads a double-quoted literal; the opening quote is the next char.
    fn quoted(&mut self, start: Position) -> Result<String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        Err(parse_error(start, "unterminated string literal"))
    }

    fn number(&mut self, start: Position, negative: bool) -> Result<Token> {
        let mut digits = String::new();
        if negative {
            digits.push('-');
        }
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        digits
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| parse_error(start, format!("integer literal out of range: {digits}")))
    }

    fn word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                word.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "notin" => Token::NotIn,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(word),
        }
    }

    fn expect_next(&mut self, expected: char, start: Position) -> Result<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(parse_error(start, format!("expected `{expected}`")))
        }
    }
}

/// Tokenize a SECL expression.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    while let Some(ch) = lexer.peek() {
        let pos = lexer.position();
        let token = match ch {
            ' ' | '\t' | '\n' | '\r' => {
                lexer.bump();
                continue;
            }
            '(' => {
                lexer.bump();
                Token::LeftParen
            }
            ')' => {
                lexer.bump();
                Token::RightParen
            }
            '[' => {
                lexer.bump();
                Token::LeftBracket
            }
            ']' => {
                lexer.bump();
                Token::RightBracket
            }
            ',' => {
                lexer.bump();
                Token::Comma
            }
            '"' => Token::Str(lexer.quoted(pos)?),
            '~' => {
                lexer.bump();
                if lexer.peek() != Some('"') {
                    return Err(parse_error(pos, "expected string after `~`"));
                }
                Token::Pattern(lexer.quoted(pos)?)
            }
            'r' if lexer.peek_second() == Some('"') => {
                lexer.bump();
                Token::Regex(lexer.quoted(pos)?)
            }
            '&' => {
                lexer.bump();
                lexer.expect_next('&', pos)?;
                Token::And
            }
            '|' => {
                lexer.bump();
                lexer.expect_next('|', pos)?;
                Token::Or
            }
            '=' => {
                lexer.bump();
                match lexer.peek() {
                    Some('=') => {
                        lexer.bump();
                        Token::Eq
                    }
                    Some('~') => {
                        lexer.bump();
                        Token::Match
                    }
                    _ => return Err(parse_error(pos, "expected `==` or `=~`")),
                }
            }
            '!' => {
                lexer.bump();
                match lexer.peek() {
                    Some('=') => {
                        lexer.bump();
                        Token::Ne
                    }
                    Some('~') => {
                        lexer.bump();
                        Token::NotMatch
                    }
                    _ => Token::Not,
                }
            }
            '<' | '>' => {
                lexer.bump();
                let or_equal = lexer.peek() == Some('=');
                if or_equal {
                    lexer.bump();
                }
                match (ch, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::Le,
                    ('>', false) => Token::Gt,
                    _ => Token::Ge,
                }
            }
            '-' if lexer.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                lexer.bump();
                lexer.number(pos, true)?
            }
            '0'..='9' => lexer.number(pos, false)?,
            'a'..='z' | 'A'..='Z' | '_' => lexer.word(),
            _ => {
                return Err(parse_error(
                    pos,
                    format!("unexpected character in expression: '{ch}'"),
                ));
            }
        };
        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

/// Recursive descent parser for SECL expressions.
pub(crate) struct ExpressionParser<'a> {
    tokens: &'a [Spanned],
    position: usize,
    end: Position,
    depth: usize,
    max_depth: usize,
}

impl<'a> ExpressionParser<'a> {
    pub(crate) fn new(tokens: &'a [Spanned], end: Position, max_depth: usize) -> Self {
        Self {
            tokens,
            position: 0,
            end,
            depth: 0,
            max_depth,
        }
    }

    /// Enters one nesting level for the node starting at `pos`.
    fn descend(&mut self, pos: Position) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(parse_error(
                pos,
                format!("expression nesting exceeds {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.position)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current().map(|spanned| &spanned.token)
    }

    fn current_pos(&self) -> Position {
        self.current().map(|spanned| spanned.pos).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.current().cloned();
        self.position += 1;
        spanned
    }

    fn unexpected(&self, expected: &str) -> SeclError {
        match self.current() {
            Some(spanned) => parse_error(
                spanned.pos,
                format!("expected {expected}, found {}", spanned.token.describe()),
            ),
            None => parse_error(
                self.end,
                format!("expected {expected}, found end of input"),
            ),
        }
    }

    pub(crate) fn expect_end(&self) -> Result<()> {
        match self.current() {
            None => Ok(()),
            Some(spanned) => Err(parse_error(
                spanned.pos,
                format!("unexpected trailing {}", spanned.token.describe()),
            )),
        }
    }

    /// Parse OR expressions (lowest precedence).
    pub(crate) fn parse_or_expression(&mut self) -> Result<Expr> {
        // Each chained operator nests the tree built so far one level deeper.
        let depth = self.depth;
        let mut left = self.parse_and_expression()?;

        while let Some(Token::Or) = self.current_token() {
            let pos = self.current_pos();
            self.descend(pos)?;
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expr::Logical {
                pos,
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;

        while let Some(Token::And) = self.current_token() {
            let pos = self.current_pos();
            self.descend(pos)?;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Logical {
                pos,
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(Token::Not) = self.current_token() {
            let pos = self.current_pos();
            self.descend(pos)?;
            self.advance();
            let operand = self.parse_unary()?;
            self.depth -= 1;
            Ok(Expr::Not {
                pos,
                expr: Box::new(operand),
            })
        } else {
            self.parse_comparison()
        }
    }

    fn comparison_operator(&mut self) -> Option<(CmpOp, Position)> {
        let pos = self.current_pos();
        match self.current_token() {
            Some(Token::Not) => {
                if let Some(Token::In) = self.tokens.get(self.position + 1).map(|s| &s.token) {
                    self.position += 2;
                    Some((CmpOp::NotIn, pos))
                } else {
                    None
                }
            }
            Some(token) => {
                let op = token.comparison()?;
                self.advance();
                Some((op, pos))
            }
            None => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_operand()?;

        match self.comparison_operator() {
            Some((op, pos)) => {
                let right = self.parse_operand()?;
                Ok(Expr::Comparison {
                    pos,
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            None => Ok(left),
        }
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        if let Some(Token::LeftBracket) = self.current_token() {
            Ok(Expr::Array(self.parse_array()?))
        } else {
            Ok(Expr::Primary(self.parse_primary()?))
        }
    }

    pub(crate) fn parse_array(&mut self) -> Result<ArrayLit> {
        let pos = self.current_pos();
        match self.advance() {
            Some(Spanned {
                token: Token::LeftBracket,
                ..
            }) => {}
            _ => {
                self.position -= 1;
                return Err(self.unexpected("`[`"));
            }
        }

        let mut items = Vec::new();
        if let Some(Token::RightBracket) = self.current_token() {
            self.advance();
            return Ok(ArrayLit { pos, items });
        }

        loop {
            items.push(self.parse_primary()?);
            match self.current_token() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RightBracket) => {
                    self.advance();
                    return Ok(ArrayLit { pos, items });
                }
                _ => return Err(self.unexpected("`,` or `]`")),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Primary> {
        let pos = self.current_pos();
        let kind = match self.current_token() {
            Some(Token::LeftParen) => {
                self.descend(pos)?;
                self.advance();
                let expr = self.parse_or_expression()?;
                if let Some(Token::RightParen) = self.current_token() {
                    self.advance();
                    self.depth -= 1;
                    PrimaryKind::Paren(Box::new(expr))
                } else {
                    return Err(self.unexpected("closing parenthesis"));
                }
            }
            Some(Token::Ident(name)) => PrimaryKind::Ident(name.clone()),
            Some(Token::Int(value)) => PrimaryKind::Int(*value),
            Some(Token::Str(value)) => PrimaryKind::Str(value.clone()),
            Some(Token::Pattern(value)) => PrimaryKind::Pattern(value.clone()),
            Some(Token::Regex(value)) => PrimaryKind::Regex(value.clone()),
            Some(Token::True) => PrimaryKind::Bool(true),
            Some(Token::False) => PrimaryKind::Bool(false),
            _ => return Err(self.unexpected("operand")),
        };

        if !matches!(kind, PrimaryKind::Paren(_)) {
            self.advance();
        }
        Ok(Primary::new(pos, kind))
    }
}

fn end_position(source: &str) -> Position {
    let line = source.matches('\n').count() + 1;
    let column = source
        .rsplit('\n')
        .next()
        .map(|last| last.chars().count() + 1)
        .unwrap_or(1);
    Position::new(source.len(), line, column)
}

/// Position of the last char boundary at or before `offset`.
fn position_at(source: &str, offset: usize) -> Position {
    let boundary = (0..=offset.min(source.len()))
        .rev()
        .find(|&i| source.is_char_boundary(i))
        .unwrap_or(0);
    end_position(&source[..boundary])
}

/// Parse the text of a macro.
///
/// Text starting with `[` is an array macro; a single operand is a primary
/// macro; anything else is an expression macro. Text longer than
/// `config.max_expression_length` or nested deeper than
/// `config.max_nesting_depth` is rejected.
pub fn parse_macro(source: &str, config: &CompilerConfig) -> Result<MacroAst> {
    let max_length = config.max_expression_length;
    if source.len() > max_length {
        return Err(parse_error(
            position_at(source, max_length),
            format!("expression exceeds {max_length} bytes"),
        ));
    }

    let tokens = tokenize(source)?;
    let end = end_position(source);
    if tokens.is_empty() {
        return Err(parse_error(end, "empty expression"));
    }

    let mut parser = ExpressionParser::new(&tokens, end, config.max_nesting_depth);
    let ast = if let Some(Token::LeftBracket) = parser.current_token() {
        MacroAst::Array(parser.parse_array()?)
    } else {
        match parser.parse_or_expression()? {
            Expr::Primary(primary) => MacroAst::Primary(primary),
            expr => MacroAst::Expression(expr),
        }
    };
    parser.expect_end()?;

    Ok(ast)
}

/// Parse a standalone boolean expression.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let end = end_position(source);
    if tokens.is_empty() {
        return Err(parse_error(end, "empty expression"));
    }

    let mut parser = ExpressionParser::new(&tokens, end, DEFAULT_MAX_NESTING_DEPTH);
    let expr = parser.parse_or_expression()?;
    parser.expect_end()?;
    Ok(expr)
}

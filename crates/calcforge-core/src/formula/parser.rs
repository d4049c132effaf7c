//! Lexer and parser for formulas
//!
//! The whole formula is checked against the character allow-list and tokenized
//! before parsing starts, so a rejected character never reaches evaluation.
//! Parsing is recursive descent with one function per precedence level.

use crate::error::{FormulaError, FormulaResult};
use crate::formula::ast::{BinaryOperator, Expression, UnaryOperator};
use std::fmt;

/// Token types recognized by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    True,
    False,

    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Dot,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::String(s) => write!(f, "\"{s}\""),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Identifier(name) => write!(f, "{name}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Power => write!(f, "**"),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::LessThan => write!(f, "<"),
            Token::LessThanEqual => write!(f, "<="),
            Token::GreaterThan => write!(f, ">"),
            Token::GreaterThanEqual => write!(f, ">="),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "end of formula"),
        }
    }
}

/// A token with its byte range in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Limits applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_length: usize,
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self { max_length: 10_000, max_depth: 64 }
    }
}

fn is_allowed_outside_string(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            ' ' | '\t'
                | '\n'
                | '\r'
                | '_'
                | '+'
                | '-'
                | '*'
                | '/'
                | '%'
                | '.'
                | '('
                | ')'
                | ','
                | '"'
                | '\''
                | '<'
                | '>'
                | '='
                | '!'
        )
}

/// Reject the first character outside the allow-list.
///
/// Inside string literals anything but a control character is accepted.
/// Positions are zero-based character offsets.
pub fn check_characters(input: &str) -> FormulaResult<()> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (position, ch) in input.chars().enumerate() {
        match quote {
            Some(q) => {
                if ch.is_control() {
                    return Err(FormulaError::InvalidFormulaCharacters { character: ch, position });
                }
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => {
                if !is_allowed_outside_string(ch) {
                    return Err(FormulaError::InvalidFormulaCharacters { character: ch, position });
                }
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
            }
        }
    }

    Ok(())
}

/// Lexer for tokenizing formulas
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, chars: source.char_indices().collect(), position: 0 }
    }

    fn current_char(&self) -> Option<char> {
        self.chars.get(self.position).map(|(_, ch)| *ch)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).map(|(_, ch)| *ch)
    }

    fn byte_offset(&self) -> usize {
        self.chars.get(self.position).map_or(self.source.len(), |(offset, _)| *offset)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> FormulaResult<Token> {
        let start = self.byte_offset();
        let mut seen_dot = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !seen_dot && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.byte_offset()];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|e| FormulaError::invalid_formula(format!("invalid number '{text}': {e}")))
    }

    fn read_string(&mut self, quote: char) -> FormulaResult<Token> {
        let mut string = String::new();
        self.advance(); // Skip opening quote

        while let Some(ch) = self.current_char() {
            if ch == quote {
                self.advance();
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                match self.current_char() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some('r') => string.push('\r'),
                    Some('\\') => string.push('\\'),
                    Some('"') => string.push('"'),
                    Some('\'') => string.push('\''),
                    Some(other) => {
                        string.push('\\');
                        string.push(other);
                    }
                    None => break,
                }
                self.advance();
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(FormulaError::invalid_formula("unterminated string literal"))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.byte_offset();

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        match &self.source[start..self.byte_offset()] {
            "true" => Token::True,
            "false" => Token::False,
            identifier => Token::Identifier(identifier.to_string()),
        }
    }

    /// Consume `ch` and produce `single`, or also the next character and
    /// produce `double` when that character is `second`.
    fn one_or_two(&mut self, second: char, single: Token, double: Token) -> Token {
        if self.peek() == Some(second) {
            self.advance();
            self.advance();
            double
        } else {
            self.advance();
            single
        }
    }

    fn read_equality(&mut self, negated: bool) -> FormulaResult<Token> {
        if self.peek() != Some('=') {
            return Err(FormulaError::invalid_formula(if negated {
                "unexpected '!', did you mean '!='?"
            } else {
                "unexpected '=', did you mean '=='?"
            }));
        }
        self.advance();
        self.advance();
        // `===` and `!==` behave like `==` and `!=`
        if self.current_char() == Some('=') {
            self.advance();
        }
        Ok(if negated { Token::NotEqual } else { Token::Equal })
    }

    pub fn next_token(&mut self) -> FormulaResult<SpannedToken> {
        self.skip_whitespace();
        let start = self.byte_offset();
        let position = self.position;

        let token = match self.current_char() {
            None => Token::Eof,
            Some(ch) => match ch {
                '0'..='9' => self.read_number()?,
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
                '"' | '\'' => self.read_string(ch)?,
                'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),
                '+' => {
                    self.advance();
                    Token::Plus
                }
                '-' => {
                    self.advance();
                    Token::Minus
                }
                '*' => self.one_or_two('*', Token::Star, Token::Power),
                '/' => {
                    self.advance();
                    Token::Slash
                }
                '%' => {
                    self.advance();
                    Token::Percent
                }
                '=' => self.read_equality(false)?,
                '!' => self.read_equality(true)?,
                '<' => self.one_or_two('=', Token::LessThan, Token::LessThanEqual),
                '>' => self.one_or_two('=', Token::GreaterThan, Token::GreaterThanEqual),
                '(' => {
                    self.advance();
                    Token::LeftParen
                }
                ')' => {
                    self.advance();
                    Token::RightParen
                }
                ',' => {
                    self.advance();
                    Token::Comma
                }
                '.' => {
                    self.advance();
                    Token::Dot
                }
                _ => {
                    return Err(FormulaError::InvalidFormulaCharacters { character: ch, position });
                }
            },
        };

        Ok(SpannedToken { token, start, end: self.byte_offset() })
    }
}

/// Check the allow-list and split the whole input into tokens, ending with `Eof`
pub fn tokenize(input: &str) -> FormulaResult<Vec<SpannedToken>> {
    check_characters(input)?;

    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Parser for formulas
pub struct Parser {
    tokens: Vec<SpannedToken>,
    index: usize,
    depth: usize,
    max_depth: usize,
    // Height of the tree most recently returned by a parse step
    height: usize,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>, max_depth: usize) -> Self {
        Self { tokens, index: 0, depth: 0, max_depth, height: 0 }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.index).map_or(&Token::Eof, |t| &t.token)
    }

    fn peek_token(&self) -> &Token {
        self.tokens.get(self.index + 1).map_or(&Token::Eof, |t| &t.token)
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() {
            self.index += 1;
        }
    }

    fn unexpected(&self) -> FormulaError {
        match self.tokens.get(self.index) {
            Some(SpannedToken { token: Token::Eof, .. }) | None => {
                FormulaError::invalid_formula("unexpected end of formula")
            }
            Some(spanned) => FormulaError::invalid_formula(format!(
                "unexpected '{}' at position {}",
                spanned.token, spanned.start
            )),
        }
    }

    fn expect(&mut self, expected: Token) -> FormulaResult<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(FormulaError::invalid_formula(format!(
                "expected '{}', found '{}'",
                expected,
                self.current_token()
            )))
        }
    }

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::invalid_formula(format!(
                "formula is nested deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    /// Record the height of a node just built; flat operator chains count too
    fn node(&mut self, height: usize) -> FormulaResult<()> {
        if height > self.max_depth {
            return Err(FormulaError::invalid_formula(format!(
                "formula is nested deeper than {} levels",
                self.max_depth
            )));
        }
        self.height = height;
        Ok(())
    }

    pub fn parse_expression(&mut self) -> FormulaResult<Expression> {
        self.enter()?;
        let expr = self.parse_comparison_expression();
        self.exit();
        expr
    }

    fn parse_comparison_expression(&mut self) -> FormulaResult<Expression> {
        let mut left = self.parse_additive_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessThanEqual => BinaryOperator::LessThanOrEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterThanEqual => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let left_height = self.height;
            let right = self.parse_additive_expression()?;
            self.node(1 + left_height.max(self.height))?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> FormulaResult<Expression> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let left_height = self.height;
            let right = self.parse_multiplicative_expression()?;
            self.node(1 + left_height.max(self.height))?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> FormulaResult<Expression> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let left_height = self.height;
            let right = self.parse_unary_expression()?;
            self.node(1 + left_height.max(self.height))?;
            left = Expression::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> FormulaResult<Expression> {
        let operator = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power_expression(),
        };

        self.advance();
        self.enter()?;
        let operand = self.parse_unary_expression();
        self.exit();
        let operand = operand?;
        self.node(self.height + 1)?;
        Ok(Expression::unary(operator, operand))
    }

    fn parse_power_expression(&mut self) -> FormulaResult<Expression> {
        let base = self.parse_primary_expression()?;

        // Power is right-associative and binds tighter than a unary sign on its left
        if matches!(self.current_token(), Token::Power) {
            let base_height = self.height;
            self.advance();
            self.enter()?;
            let exponent = self.parse_unary_expression();
            self.exit();
            let exponent = exponent?;
            self.node(1 + base_height.max(self.height))?;
            return Ok(Expression::binary(base, BinaryOperator::Power, exponent));
        }

        Ok(base)
    }

    fn parse_arguments(&mut self) -> FormulaResult<Vec<Expression>> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        let mut tallest = 0;

        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);
            tallest = self.height;

            while matches!(self.current_token(), Token::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
                tallest = tallest.max(self.height);
            }
        }

        self.expect(Token::RightParen)?;
        self.node(tallest + 1)?;
        Ok(args)
    }

    fn parse_primary_expression(&mut self) -> FormulaResult<Expression> {
        match self.current_token().clone() {
            Token::Number(value) => {
                self.advance();
                self.height = 1;
                Ok(Expression::number(value))
            }
            Token::String(value) => {
                self.advance();
                self.height = 1;
                Ok(Expression::string(value))
            }
            Token::True => {
                self.advance();
                self.height = 1;
                Ok(Expression::bool(true))
            }
            Token::False => {
                self.advance();
                self.height = 1;
                Ok(Expression::bool(false))
            }
            Token::Identifier(name) if name == "Math" && *self.peek_token() == Token::Dot => {
                self.advance(); // Math
                self.advance(); // .
                let Token::Identifier(member) = self.current_token().clone() else {
                    return Err(FormulaError::invalid_formula("expected a name after 'Math.'"));
                };
                self.advance();

                if matches!(self.current_token(), Token::LeftParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expression::call(&member, args))
                } else {
                    self.height = 1;
                    Ok(Expression::constant(&member))
                }
            }
            Token::Identifier(name) => {
                self.advance();
                if matches!(self.current_token(), Token::LeftParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expression::call(&name, args))
                } else {
                    self.height = 1;
                    Ok(Expression::var(&name))
                }
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Require that every token has been consumed
    pub fn finish(&self) -> FormulaResult<()> {
        if matches!(self.current_token(), Token::Eof) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }
}

/// Parse a formula into an AST, enforcing the given limits
pub fn parse_formula(input: &str, limits: &ParseLimits) -> FormulaResult<Expression> {
    let length = input.chars().count();
    if length > limits.max_length {
        return Err(FormulaError::invalid_formula(format!(
            "formula is {length} characters long, the limit is {}",
            limits.max_length
        )));
    }

    let tokens = tokenize(input)?;
    if tokens.len() == 1 {
        return Err(FormulaError::invalid_formula("formula is empty"));
    }

    let mut parser = Parser::new(tokens, limits.max_depth);
    let expr = parser.parse_expression()?;
    parser.finish()?;

    Ok(expr)
}

/// Parse a formula with the default limits
pub fn parse_expression(input: &str) -> FormulaResult<Expression> {
    parse_formula(input, &ParseLimits::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            tokens("123 + 45.67"),
            vec![Token::Number(123.0), Token::Plus, Token::Number(45.67), Token::Eof]
        );
        assert_eq!(tokens(".5"), vec![Token::Number(0.5), Token::Eof]);
    }

    #[test]
    fn test_lexer_strings() {
        assert_eq!(
            tokens(r#""hello world" 'it\'s'"#),
            vec![
                Token::String("hello world".to_string()),
                Token::String("it's".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            tokens("a ** 2 === b !== c <= d"),
            vec![
                Token::Identifier("a".into()),
                Token::Power,
                Token::Number(2.0),
                Token::Equal,
                Token::Identifier("b".into()),
                Token::NotEqual,
                Token::Identifier("c".into()),
                Token::LessThanEqual,
                Token::Identifier("d".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_ranges() {
        let spanned = tokenize("ab + 'é' + cd").unwrap();
        let last = &spanned[4];
        assert_eq!(last.token, Token::Identifier("cd".into()));
        assert_eq!(&"ab + 'é' + cd"[last.start..last.end], "cd");
    }

    #[test]
    fn test_disallowed_characters() {
        let err = tokenize("field1; doSomethingBad()").unwrap_err();
        assert_eq!(err, FormulaError::InvalidFormulaCharacters { character: ';', position: 6 });

        for formula in ["a `b`", "a & b", "a | b", "{a}", "$a", "a[0]", "a ? b : c", "é + 1"] {
            assert_eq!(
                tokenize(formula).unwrap_err().kind(),
                ErrorKind::InvalidFormulaCharacters,
                "{formula}"
            );
        }
    }

    #[test]
    fn test_characters_inside_strings_are_allowed() {
        assert!(tokenize(r#""a; b & {c}""#).is_ok());
        assert_eq!(
            tokenize("\"tab\there\"").unwrap_err().kind(),
            ErrorKind::InvalidFormulaCharacters
        );
    }

    #[test]
    fn test_character_check_runs_before_syntax() {
        // `=` alone is a syntax error, but the semicolon later is reported first
        let err = parse_expression("a = 1; b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormulaCharacters);
    }

    #[test]
    fn test_parser_arithmetic() {
        let expr = parse_expression("2 + 3 * 4").unwrap();

        // Should parse as 2 + (3 * 4) due to operator precedence
        match expr {
            Expression::BinaryOp { left, operator: BinaryOperator::Add, right } => {
                assert_eq!(left.as_ref(), &Expression::number(2.0));
                assert_eq!(
                    right.as_ref(),
                    &Expression::binary(
                        Expression::number(3.0),
                        BinaryOperator::Multiply,
                        Expression::number(4.0)
                    )
                );
            }
            _ => panic!("Expected addition at top level"),
        }
    }

    #[test]
    fn test_parser_power_is_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expression::binary(
                Expression::number(2.0),
                BinaryOperator::Power,
                Expression::binary(
                    Expression::number(3.0),
                    BinaryOperator::Power,
                    Expression::number(2.0)
                )
            )
        );
    }

    #[test]
    fn test_parser_negated_power() {
        let expr = parse_expression("-2 ** 2").unwrap();
        assert_eq!(
            expr,
            Expression::unary(
                UnaryOperator::Negate,
                Expression::binary(
                    Expression::number(2.0),
                    BinaryOperator::Power,
                    Expression::number(2.0)
                )
            )
        );
    }

    #[test]
    fn test_parser_function_call() {
        let expr = parse_expression("max(10, 20)").unwrap();

        match expr {
            Expression::FunctionCall { name, args } => {
                assert_eq!(name, "max");
                assert_eq!(args, vec![Expression::number(10.0), Expression::number(20.0)]);
            }
            _ => panic!("Expected function call"),
        }
    }

    #[test]
    fn test_parser_math_namespace() {
        assert_eq!(
            parse_expression("Math.sqrt(x)").unwrap(),
            Expression::call("sqrt", vec![Expression::var("x")])
        );
        assert_eq!(parse_expression("Math.PI").unwrap(), Expression::constant("PI"));
        assert!(parse_expression("Math.").is_err());
        assert!(parse_expression("a.b").is_err());
    }

    #[test]
    fn test_parser_comparison() {
        let expr = parse_expression("a + 1 >= b").unwrap();
        assert_eq!(
            expr,
            Expression::binary(
                Expression::binary(Expression::var("a"), BinaryOperator::Add, Expression::number(1.0)),
                BinaryOperator::GreaterThanOrEqual,
                Expression::var("b")
            )
        );
    }

    #[test]
    fn test_parser_errors() {
        for formula in ["", "   ", "1 +", "(1 + 2", "1 2", "f(1,)", "a = 1", "!a", "'open", "3()"] {
            let err = parse_expression(formula).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormula, "{formula}");
        }
    }

    #[test]
    fn test_parser_limits() {
        let limits = ParseLimits { max_length: 10, max_depth: 3 };
        assert!(parse_formula("1 + 2 + 3 + 4", &limits).is_err());
        assert!(parse_formula("((1))", &limits).is_ok());
        assert!(parse_formula("((((1))))", &limits).is_err());
        assert!(parse_formula("----1", &limits).is_err());
    }

    #[test]
    fn test_parser_limits_count_operator_chains() {
        let limits = ParseLimits { max_length: 100, max_depth: 3 };
        assert!(parse_formula("1 + 2 + 3", &limits).is_ok());
        assert!(parse_formula("1 * 2 + 3 * 4", &limits).is_ok());
        assert!(parse_formula("1 + 2 + 3 + 4", &limits).is_err());
        assert!(parse_formula("1 < 2 < 3 < 4", &limits).is_err());
        assert!(parse_formula("((1 + 2 + 3) + 4)", &limits).is_err());
        assert!(parse_formula("max(1, 2 * 3)", &limits).is_ok());
        assert!(parse_formula("max(1, 2 * 3 * 4)", &limits).is_err());
        assert!(parse_formula("2 ** 2 ** 2 ** 2", &limits).is_err());

        let chain = vec!["1"; 5_000].join("+");
        let err = parse_expression(&chain).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormula);
    }
}

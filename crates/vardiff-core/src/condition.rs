//! Recognition of conditional-compilation directives and parsing of their
//! guard expressions.
//!
//! Guards are reduced to propositional [`Formula`]s:
//!
//! - `defined(X)`, `defined X`, and a bare identifier `X` all become the
//!   literal `X`.
//! - `!`, `&&`, `||` and parentheses keep their boolean meaning.
//! - Integer constants fold to `true` (non-zero) or `false` (zero).
//! - Anything else (comparisons, arithmetic, function-like macro calls) is
//!   abstracted into one opaque literal named by its normalized text, so
//!   `VERSION >= 3` is the literal `"VERSION >= 3"`.
//!
//! The normalized text of a guard is stored as the node label. Parsing that
//! label again yields the same formula.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::enums::CodeType;
use crate::formula::Formula;

/// Matches a directive line with its diff marker already stripped.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#\s*(ifdef|ifndef|if|elifdef|elifndef|elif|else|endif)\b(.*)$")
        .unwrap_or_else(|_| unreachable!("directive pattern is a valid literal"))
});

// ---------------------------------------------------------------------------
// ConditionError
// ---------------------------------------------------------------------------

/// A guard expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// `#if` or `#elif` without an expression.
    Empty,
    /// Parentheses do not balance.
    UnbalancedParentheses,
    /// The expression ended where an operand was expected.
    UnexpectedEnd,
    /// A token appeared where an operand was expected.
    UnexpectedToken(String),
    /// Tokens remained after a complete expression.
    TrailingInput(String),
    /// `#ifdef`, `#ifndef` or `defined` was not followed by an identifier.
    ExpectedIdentifier(String),
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty guard expression"),
            Self::UnbalancedParentheses => f.write_str("unbalanced parentheses"),
            Self::UnexpectedEnd => f.write_str("unexpected end of expression"),
            Self::UnexpectedToken(tok) => write!(f, "unexpected token \"{tok}\""),
            Self::TrailingInput(tok) => write!(f, "unexpected trailing input at \"{tok}\""),
            Self::ExpectedIdentifier(found) => {
                write!(f, "expected a macro name, found \"{found}\"")
            }
        }
    }
}

impl std::error::Error for ConditionError {}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

/// A parsed guard: its normalized text and its formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    /// Normalized expression text, used as the node label.
    pub label: String,
    /// The propositional reading of the expression.
    pub formula: Formula,
}

/// A recognized preprocessor directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// One of IF, ELIF, ELSE, ENDIF.
    pub code_type: CodeType,
    /// Present exactly for IF and ELIF.
    pub guard: Option<Guard>,
}

/// Recognizes a conditional directive in `line` (diff marker already
/// removed).
///
/// Returns `Ok(None)` for every line that is not `#if`, `#ifdef`, `#ifndef`,
/// `#elif`, `#elifdef`, `#elifndef`, `#else` or `#endif`; such lines are code.
///
/// # Errors
///
/// Returns [`ConditionError`] when the line is an IF or ELIF directive whose
/// guard cannot be parsed.
pub fn parse_directive(line: &str) -> Result<Option<Directive>, ConditionError> {
    let Some(caps) = DIRECTIVE_RE.captures(line) else {
        return Ok(None);
    };
    let keyword = caps.get(1).map_or("", |m| m.as_str());
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let directive = match keyword {
        "if" => Directive {
            code_type: CodeType::If,
            guard: Some(parse_condition(rest)?),
        },
        "elif" => Directive {
            code_type: CodeType::Elif,
            guard: Some(parse_condition(rest)?),
        },
        "ifdef" | "elifdef" | "ifndef" | "elifndef" => {
            let name = macro_name(rest)?;
            let guard = if keyword.ends_with("ndef") {
                Guard {
                    label: format!("!defined({name})"),
                    formula: Formula::not(Formula::var(name)),
                }
            } else {
                Guard {
                    label: format!("defined({name})"),
                    formula: Formula::var(name),
                }
            };
            let code_type = if keyword.starts_with("elif") {
                CodeType::Elif
            } else {
                CodeType::If
            };
            Directive {
                code_type,
                guard: Some(guard),
            }
        }
        "else" => Directive {
            code_type: CodeType::Else,
            guard: None,
        },
        _ => Directive {
            code_type: CodeType::Endif,
            guard: None,
        },
    };
    Ok(Some(directive))
}

/// Returns `true` if `line` (diff marker removed) is a conditional directive.
pub fn is_directive(line: &str) -> bool {
    DIRECTIVE_RE.is_match(line)
}

/// Parses a guard expression into its normalized label and formula.
///
/// # Errors
///
/// Returns [`ConditionError`] for empty input, unbalanced parentheses, or a
/// token sequence that is not an expression.
pub fn parse_condition(expression: &str) -> Result<Guard, ConditionError> {
    let stripped = strip_comments(expression);
    let tokens = tokenize(&stripped);
    if tokens.is_empty() {
        return Err(ConditionError::Empty);
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let formula = parser.parse_or()?;
    if let Some(tok) = tokens.get(parser.pos) {
        return Err(if *tok == Token::RParen {
            ConditionError::UnbalancedParentheses
        } else {
            ConditionError::TrailingInput(tok.text().to_owned())
        });
    }
    Ok(Guard {
        label: render(&tokens),
        formula,
    })
}

fn macro_name(rest: &str) -> Result<String, ConditionError> {
    let stripped = strip_comments(rest);
    let name = stripped.split_whitespace().next().unwrap_or("");
    if crate::formula::is_identifier(name) {
        Ok(name.to_owned())
    } else {
        Err(ConditionError::ExpectedIdentifier(name.to_owned()))
    }
}

/// Removes `//` line comments and `/* */` block comments.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), Some(b)) if l < b => {
                out.push_str(&rest[..l]);
                return out;
            }
            (Some(l), None) => {
                out.push_str(&rest[..l]);
                return out;
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                out.push(' ');
                match rest[b + 2..].find("*/") {
                    Some(end) => rest = &rest[b + 2 + end + 2..],
                    None => return out,
                }
            }
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(String),
    LParen,
    RParen,
    Bang,
    AndAnd,
    OrOr,
    /// Any operator or literal without boolean meaning.
    Other(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Ident(s) | Token::Number(s) | Token::Other(s) => s,
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Bang => "!",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
        }
    }
}

const TWO_CHAR_OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "<<", ">>"];

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
            {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
            continue;
        }
        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            tokens.push(Token::Other(chars[start..i].iter().collect()));
            continue;
        }
        let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let token = match pair.as_str() {
            "&&" => Some(Token::AndAnd),
            "||" => Some(Token::OrOr),
            p if TWO_CHAR_OPERATORS.contains(&p) => Some(Token::Other(p.to_owned())),
            _ => None,
        };
        if let Some(token) = token {
            tokens.push(token);
            i += 2;
            continue;
        }
        tokens.push(match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '!' => Token::Bang,
            other => Token::Other(other.to_string()),
        });
        i += 1;
    }
    tokens
}

/// Joins tokens with single spaces, except directly inside parentheses,
/// before commas, after `!`, and between a macro name and its argument list.
fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for tok in tokens {
        if let Some(p) = prev {
            let glued = *p == Token::LParen
                || (*p == Token::Bang && !matches!(tok, Token::Other(_)))
                || *tok == Token::RParen
                || tok.text() == ","
                || (matches!(p, Token::Ident(_)) && *tok == Token::LParen);
            if !glued {
                out.push(' ');
            }
        }
        out.push_str(tok.text());
        prev = Some(tok);
    }
    out
}

fn integer_value(literal: &str) -> Option<u64> {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()
    } else {
        digits.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Precedence climbing over `||`, `&&`, `!` and primaries.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Formula, ConditionError> {
        let mut operands = vec![self.parse_and()?];
        while self.eat(&Token::OrOr) {
            operands.push(self.parse_and()?);
        }
        Ok(Formula::or(operands))
    }

    fn parse_and(&mut self) -> Result<Formula, ConditionError> {
        let mut operands = vec![self.parse_unary()?];
        while self.eat(&Token::AndAnd) {
            operands.push(self.parse_unary()?);
        }
        Ok(Formula::and(operands))
    }

    fn parse_unary(&mut self) -> Result<Formula, ConditionError> {
        if self.eat(&Token::Bang) {
            return Ok(Formula::not(self.parse_unary()?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Formula, ConditionError> {
        let start = self.pos;
        let formula = match self.next_token() {
            None => return Err(ConditionError::UnexpectedEnd),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ConditionError::UnbalancedParentheses);
                }
                inner
            }
            Some(Token::Ident(name)) if name == "defined" => self.parse_defined()?,
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.opaque_from(start);
                }
                Formula::var(name)
            }
            Some(Token::Number(literal)) => match integer_value(&literal) {
                Some(0) => Formula::False,
                Some(_) => Formula::True,
                None => return self.opaque_from(start),
            },
            Some(Token::Other(_)) => return self.opaque_from(start),
            Some(tok @ (Token::RParen | Token::AndAnd | Token::OrOr | Token::Bang)) => {
                return Err(ConditionError::UnexpectedToken(tok.text().to_owned()));
            }
        };
        if matches!(self.peek(), Some(Token::Other(_))) {
            return self.opaque_from(start);
        }
        Ok(formula)
    }

    fn parse_defined(&mut self) -> Result<Formula, ConditionError> {
        let parenthesized = self.eat(&Token::LParen);
        let name = match self.next_token() {
            Some(Token::Ident(name)) => name,
            Some(tok) => return Err(ConditionError::ExpectedIdentifier(tok.text().to_owned())),
            None => return Err(ConditionError::ExpectedIdentifier(String::new())),
        };
        if parenthesized && !self.eat(&Token::RParen) {
            return Err(ConditionError::UnbalancedParentheses);
        }
        Ok(Formula::var(name))
    }

    /// Consumes the non-boolean subexpression starting at `start` up to the
    /// next top-level `&&`, `||` or unmatched `)` and names a literal after it.
    fn opaque_from(&mut self, start: usize) -> Result<Formula, ConditionError> {
        self.pos = start;
        let mut depth = 0usize;
        while let Some(tok) = self.tokens.get(self.pos) {
            if *tok == Token::LParen {
                depth += 1;
            } else if *tok == Token::RParen {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if depth == 0 && matches!(tok, Token::AndAnd | Token::OrOr) {
                break;
            }
            self.pos += 1;
        }
        if depth != 0 {
            return Err(ConditionError::UnbalancedParentheses);
        }
        Ok(Formula::var(render(&self.tokens[start..self.pos])))
    }
}

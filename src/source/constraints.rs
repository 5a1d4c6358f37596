// src/source/constraints.rs

//! Build constraints: file-name suffixes and `//go:build` expressions.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use crate::package::Environment;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
    "ppc64le", "riscv64", "s390x", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// `wanted` names the environment's OS or one it implies.
fn os_satisfies(env_os: &str, wanted: &str) -> bool {
    env_os == wanted
        || (wanted == "linux" && env_os == "android")
        || (wanted == "solaris" && env_os == "illumos")
        || (wanted == "darwin" && env_os == "ios")
}

fn tag_satisfied(tag: &str, env: &Environment) -> bool {
    if os_satisfies(&env.os, tag) || tag == env.arch || env.has_tag(tag) {
        return true;
    }
    if tag == "unix" {
        return UNIX_OS.contains(&env.os.as_str());
    }
    // Release tags are assumed satisfied by the toolchain in use.
    tag.strip_prefix("go1.")
        .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether a file stem (extension and test suffix already stripped) passes
/// the `_os`, `_arch` and `_os_arch` naming convention for `env`.
pub fn matches_file_name(stem: &str, env: &Environment) -> bool {
    let parts: Vec<&str> = stem.split('_').collect();
    let n = parts.len();
    if n >= 3 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return os_satisfies(&env.os, parts[n - 2]) && env.arch == parts[n - 1];
    }
    if n >= 2 {
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) {
            return os_satisfies(&env.os, last);
        }
        if KNOWN_ARCH.contains(&last) {
            return env.arch == last;
        }
    }
    true
}

/// The `//go:build` expression in a file's header, if any.
///
/// Only comments and blank lines may precede it; scanning stops at the first
/// other line.
pub fn find_build_expr(source: &str) -> Option<(u32, &str)> {
    let mut in_block = false;
    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if in_block {
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("//") {
            if let Some(expr) = rest.strip_prefix("go:build") {
                if expr.is_empty() || expr.starts_with(char::is_whitespace) {
                    return Some((idx as u32 + 1, expr.trim()));
                }
            }
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        break;
    }
    None
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("unexpected character {0:?} in build constraint")]
    UnexpectedChar(char),
    #[error("unexpected end of build constraint")]
    UnexpectedEnd,
    #[error("unexpected token {0:?} in build constraint")]
    UnexpectedToken(String),
    #[error("build constraint nested deeper than {MAX_DEPTH} levels")]
    TooComplex,
}

/// Deepest `!`/parenthesis nesting the parser accepts.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Tag(String),
    Not(Box<Expr>),
    All(Vec<Expr>),
    Any(Vec<Expr>),
}

impl Expr {
    fn eval(&self, env: &Environment) -> bool {
        match self {
            Expr::Tag(tag) => tag_satisfied(tag, env),
            Expr::Not(inner) => !inner.eval(env),
            Expr::All(terms) => terms.iter().all(|t| t.eval(env)),
            Expr::Any(terms) => terms.iter().any(|t| t.eval(env)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ConstraintError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = expr.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '!' => tokens.push(Token::Not),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '&' | '|' => {
                if chars.next_if(|&(_, n)| n == c).is_none() {
                    return Err(ConstraintError::UnexpectedChar(c));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, n)) = chars.peek() {
                    if !(n.is_alphanumeric() || n == '_' || n == '.') {
                        break;
                    }
                    end = i + n.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Tag(expr[start..end].to_string()));
            }
            other => return Err(ConstraintError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Result<Expr, ConstraintError> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.bump();
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Any(terms)
        })
    }

    fn and(&mut self) -> Result<Expr, ConstraintError> {
        let mut terms = vec![self.not()?];
        while self.peek() == Some(&Token::And) {
            self.bump();
            terms.push(self.not()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::All(terms)
        })
    }

    fn not(&mut self) -> Result<Expr, ConstraintError> {
        if self.depth >= MAX_DEPTH {
            return Err(ConstraintError::TooComplex);
        }
        self.depth += 1;
        let expr = self.unary();
        self.depth -= 1;
        expr
    }

    fn unary(&mut self) -> Result<Expr, ConstraintError> {
        match self.bump() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.not()?))),
            Some(Token::Open) => {
                let inner = self.or()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    Some(other) => Err(ConstraintError::UnexpectedToken(format!("{other:?}"))),
                    None => Err(ConstraintError::UnexpectedEnd),
                }
            }
            Some(Token::Tag(tag)) => Ok(Expr::Tag(tag)),
            Some(other) => Err(ConstraintError::UnexpectedToken(format!("{other:?}"))),
            None => Err(ConstraintError::UnexpectedEnd),
        }
    }
}

/// Evaluate a `//go:build` expression against `env`.
pub fn eval_build_expr(expr: &str, env: &Environment) -> Result<bool, ConstraintError> {
    let mut parser = Parser {
        tokens: tokenize(expr)?,
        pos: 0,
        depth: 0,
    };
    let parsed = parser.or()?;
    if let Some(extra) = parser.bump() {
        return Err(ConstraintError::UnexpectedToken(format!("{extra:?}")));
    }
    Ok(parsed.eval(env))
}

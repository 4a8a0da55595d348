//! Member declaration parsing.
//!
//! Declarations use a small C-like syntax:
//!
//! ```text
//! int add(int a, int b)            // method
//! void reset()                     // void method
//! string Name { get; set; }        // read/write property
//! int Count { get; }               // read-only property
//! ```
//!
//! Type names are resolved through a caller-supplied function so that
//! builders can register aliases for native types.

use crate::error::DeclarationError;
use crate::{DataType, Param};

/// Key under which custom data is exposed to callbacks.
pub const DATA_KEY: &str = "__data";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
}

fn tokenize(decl: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let bytes = decl.as_bytes();
    let mut i = 0;

    while let Some(c) = decl[i..].chars().next() {
        match c {
            c if c.is_whitespace() => i += c.len_utf8(),
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Ident(&decl[i..i + 1]));
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(&decl[start..i]));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Cursor<'d, 'a, R> {
    decl: &'d str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    resolve: R,
}

impl<'d, 'a, R> Cursor<'d, 'a, R>
where
    R: Fn(&str) -> Option<DataType>,
{
    fn invalid(&self, reason: impl Into<String>) -> DeclarationError {
        DeclarationError::InvalidDeclaration {
            decl: self.decl.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token<'static>, what: &str) -> Result<(), DeclarationError> {
        match self.next() {
            Some(ref token) if *token == expected => Ok(()),
            _ => Err(self.invalid(format!("expected {}", what))),
        }
    }

    fn ident(&mut self, what: &str) -> Result<&'a str, DeclarationError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(self.invalid(format!("expected {}", what))),
        }
    }

    fn data_type(&mut self) -> Result<DataType, DeclarationError> {
        let name = self.ident("type")?;
        (self.resolve)(name).ok_or_else(|| DeclarationError::UnknownType {
            name: name.to_string(),
            decl: self.decl.to_string(),
        })
    }

    fn finish(&self) -> Result<(), DeclarationError> {
        if self.pos < self.tokens.len() {
            return Err(self.invalid("unexpected trailing input"));
        }
        Ok(())
    }
}

fn cursor<'d, R>(decl: &'d str, resolve: R) -> Result<Cursor<'d, 'd, R>, DeclarationError> {
    let trimmed = decl.trim();
    if trimmed.is_empty() {
        return Err(DeclarationError::InvalidDeclaration {
            decl: decl.to_string(),
            reason: "empty declaration".to_string(),
        });
    }
    let tokens = tokenize(trimmed).map_err(|reason| DeclarationError::InvalidDeclaration {
        decl: decl.to_string(),
        reason,
    })?;
    Ok(Cursor {
        decl: trimmed,
        tokens,
        pos: 0,
        resolve,
    })
}

/// A parsed method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: DataType,
}

/// A parsed property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub data_type: DataType,
    pub get: bool,
    pub set: bool,
}

/// Parse `ReturnType name(Type a, Type b)`.
pub fn parse_method<R>(decl: &str, resolve: R) -> Result<MethodDecl, DeclarationError>
where
    R: Fn(&str) -> Option<DataType>,
{
    let mut cur = cursor(decl, resolve)?;

    let return_type = cur.data_type()?;
    let name = cur.ident("method name")?.to_string();
    cur.expect(Token::LParen, "'('")?;

    let mut params = Vec::new();
    if cur.peek() == Some(&Token::RParen) {
        cur.next();
    } else {
        loop {
            let data_type = cur.data_type()?;
            if data_type.is_void() {
                return Err(cur.invalid("parameters cannot be void"));
            }
            let param_name = cur.ident("parameter name")?;
            params.push(Param::new(param_name, data_type));
            match cur.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(cur.invalid("expected ',' or ')'")),
            }
        }
    }
    cur.finish()?;

    validate_params(&name, &params)?;

    Ok(MethodDecl {
        name,
        params,
        return_type,
    })
}

/// Parse `Type Name { get; set; }`.
pub fn parse_property<R>(decl: &str, resolve: R) -> Result<PropertyDecl, DeclarationError>
where
    R: Fn(&str) -> Option<DataType>,
{
    let mut cur = cursor(decl, resolve)?;

    let data_type = cur.data_type()?;
    if data_type.is_void() {
        return Err(cur.invalid("properties cannot be void"));
    }
    let name = cur.ident("property name")?.to_string();
    cur.expect(Token::LBrace, "'{'")?;

    let (mut get, mut set) = (false, false);
    loop {
        match cur.next() {
            Some(Token::RBrace) => break,
            Some(Token::Ident("get")) if !get => get = true,
            Some(Token::Ident("set")) if !set => set = true,
            _ => return Err(cur.invalid("expected 'get;', 'set;' or '}'")),
        }
        cur.expect(Token::Semi, "';'")?;
    }
    cur.finish()?;

    if !get && !set {
        return Err(DeclarationError::NoAccessors { name });
    }

    Ok(PropertyDecl {
        name,
        data_type,
        get,
        set,
    })
}

/// Check parameter names for reserved and duplicate entries.
pub fn validate_params(member: &str, params: &[Param]) -> Result<(), DeclarationError> {
    for (i, param) in params.iter().enumerate() {
        if param.name == DATA_KEY {
            return Err(DeclarationError::ReservedParameter {
                name: param.name.clone(),
            });
        }
        if params[..i].iter().any(|p| p.name == param.name) {
            return Err(DeclarationError::DuplicateParameter {
                member: member.to_string(),
                param: param.name.clone(),
            });
        }
    }
    Ok(())
}

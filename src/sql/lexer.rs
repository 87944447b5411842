//! Hand-rolled tokenizer: keywords, identifiers, INT/STRING literals, and
//! the handful of punctuation marks the grammar in [`crate::sql::parser`]
//! needs.

use crate::error::ExecError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Create,
    Drop,
    Table,
    Index,
    On,
    Show,
    Tables,
    Columns,
    Insert,
    Into,
    Values,
    Delete,
    From,
    Where,
    And,
    Select,
    Star,
    IntType,
    TextType,
    Identifier(String),
    IntLiteral(i32),
    StringLiteral(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
    Dot,
    Eof,
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word.to_ascii_uppercase().as_str() {
        "CREATE" => Token::Create,
        "DROP" => Token::Drop,
        "TABLE" => Token::Table,
        "INDEX" => Token::Index,
        "ON" => Token::On,
        "SHOW" => Token::Show,
        "TABLES" => Token::Tables,
        "COLUMNS" => Token::Columns,
        "INSERT" => Token::Insert,
        "INTO" => Token::Into,
        "VALUES" => Token::Values,
        "DELETE" => Token::Delete,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "AND" => Token::And,
        "SELECT" => Token::Select,
        "INT" | "INTEGER" => Token::IntType,
        "TEXT" | "VARCHAR" => Token::TextType,
        _ => return None,
    })
}

/// Tokenize `input`, appending a trailing [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExecError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ExecError::Parse(format!(
                        "unterminated string literal starting at {start}"
                    )));
                }
                tokens.push(Token::StringLiteral(chars[start..j].iter().collect()));
                i = j + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i32>()
                    .map_err(|_| ExecError::Parse(format!("invalid integer literal `{text}`")))?;
                tokens.push(Token::IntLiteral(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(&word).unwrap_or(Token::Identifier(word)));
            }
            other => {
                return Err(ExecError::Parse(format!("unexpected character `{other}`")));
            }
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

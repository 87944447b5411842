//! Recursive-descent parser producing the [`crate::sql::ast::Statement`]
//! tree from the token stream [`crate::sql::lexer::tokenize`] produces.

use crate::error::ExecError;
use crate::sql::ast::{Expr, Identifier, Literal, Statement};
use crate::sql::lexer::{tokenize, Token};
use crate::value::DataType;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExecError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExecError::Parse(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier, ExecError> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(ExecError::Parse(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn parse_data_type(&mut self) -> Result<DataType, ExecError> {
        match self.advance() {
            Token::IntType => Ok(DataType::Int),
            Token::TextType => Ok(DataType::Text),
            other => Err(ExecError::Parse(format!(
                "expected a column type, found {other:?}"
            ))),
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<Identifier>, ExecError> {
        let mut names = vec![self.expect_identifier()?];
        while *self.peek() == Token::Comma {
            self.advance();
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    fn parse_column_defs(&mut self) -> Result<Vec<(Identifier, DataType)>, ExecError> {
        let mut columns = vec![(self.expect_identifier()?, self.parse_data_type()?)];
        while *self.peek() == Token::Comma {
            self.advance();
            columns.push((self.expect_identifier()?, self.parse_data_type()?));
        }
        Ok(columns)
    }

    fn parse_literal(&mut self) -> Result<Literal, ExecError> {
        match self.advance() {
            Token::IntLiteral(i) => Ok(Literal::Int(i)),
            Token::StringLiteral(s) => Ok(Literal::Text(s)),
            other => Err(ExecError::Parse(format!(
                "expected an INT or STRING literal, found {other:?}"
            ))),
        }
    }

    fn parse_literal_list(&mut self) -> Result<Vec<Literal>, ExecError> {
        let mut values = vec![self.parse_literal()?];
        while *self.peek() == Token::Comma {
            self.advance();
            values.push(self.parse_literal()?);
        }
        Ok(values)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExecError> {
        let first = self.expect_identifier()?;
        let (table, column) = if *self.peek() == Token::Dot {
            self.advance();
            (Some(first), self.expect_identifier()?)
        } else {
            (None, first)
        };
        self.expect(&Token::Equals)?;
        let value = self.parse_literal()?;
        Ok(Expr::Equals {
            table,
            column,
            value,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.parse_comparison()?;
        while *self.peek() == Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_where_clause(&mut self) -> Result<Option<Expr>, ExecError> {
        if *self.peek() == Token::Where {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_create(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // CREATE
        match self.advance() {
            Token::Table => {
                let table = self.expect_identifier()?;
                self.expect(&Token::LParen)?;
                let columns = self.parse_column_defs()?;
                self.expect(&Token::RParen)?;
                Ok(Statement::CreateTable { table, columns })
            }
            Token::Index => {
                let index = self.expect_identifier()?;
                self.expect(&Token::On)?;
                let table = self.expect_identifier()?;
                self.expect(&Token::LParen)?;
                let columns = self.parse_identifier_list()?;
                self.expect(&Token::RParen)?;
                Ok(Statement::CreateIndex {
                    table,
                    index,
                    columns,
                })
            }
            other => Err(ExecError::Parse(format!(
                "expected TABLE or INDEX after CREATE, found {other:?}"
            ))),
        }
    }

    fn parse_drop(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // DROP
        match self.advance() {
            Token::Table => {
                let table = self.expect_identifier()?;
                Ok(Statement::DropTable { table })
            }
            Token::Index => {
                let index = self.expect_identifier()?;
                self.expect(&Token::On)?;
                let table = self.expect_identifier()?;
                Ok(Statement::DropIndex { table, index })
            }
            other => Err(ExecError::Parse(format!(
                "expected TABLE or INDEX after DROP, found {other:?}"
            ))),
        }
    }

    fn parse_show(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // SHOW
        match self.advance() {
            Token::Tables => Ok(Statement::ShowTables),
            Token::Columns => {
                self.expect(&Token::From)?;
                let table = self.expect_identifier()?;
                Ok(Statement::ShowColumns { table })
            }
            Token::Index => {
                self.expect(&Token::From)?;
                let table = self.expect_identifier()?;
                Ok(Statement::ShowIndex { table })
            }
            other => Err(ExecError::Parse(format!(
                "expected TABLES, COLUMNS or INDEX after SHOW, found {other:?}"
            ))),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // INSERT
        self.expect(&Token::Into)?;
        let table = self.expect_identifier()?;
        let columns = if *self.peek() == Token::LParen {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(&Token::RParen)?;
            Some(cols)
        } else {
            None
        };
        self.expect(&Token::Values)?;
        self.expect(&Token::LParen)?;
        let values = self.parse_literal_list()?;
        self.expect(&Token::RParen)?;
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_delete(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // DELETE
        self.expect(&Token::From)?;
        let table = self.expect_identifier()?;
        let where_clause = self.parse_where_clause()?;
        Ok(Statement::Delete { table, where_clause })
    }

    fn parse_select(&mut self) -> Result<Statement, ExecError> {
        self.advance(); // SELECT
        let columns = if *self.peek() == Token::Star {
            self.advance();
            None
        } else {
            Some(self.parse_identifier_list()?)
        };
        self.expect(&Token::From)?;
        let table = self.expect_identifier()?;
        let where_clause = self.parse_where_clause()?;
        Ok(Statement::Select {
            table,
            columns,
            where_clause,
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, ExecError> {
        match self.peek() {
            Token::Create => self.parse_create(),
            Token::Drop => self.parse_drop(),
            Token::Show => self.parse_show(),
            Token::Insert => self.parse_insert(),
            Token::Delete => self.parse_delete(),
            Token::Select => self.parse_select(),
            other => Err(ExecError::Parse(format!(
                "expected a statement keyword, found {other:?}"
            ))),
        }
    }
}

/// Tokenize and parse one SQL statement, tolerating (but not requiring) a
/// single trailing `;`.
pub fn parse(input: &str) -> Result<Statement, ExecError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.parse_statement()?;
    if *parser.peek() == Token::Semicolon {
        parser.advance();
    }
    if *parser.peek() != Token::Eof {
        return Err(ExecError::Parse(format!(
            "unexpected trailing input at {:?}",
            parser.peek()
        )));
    }
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table() {
        let stmt = parse("CREATE TABLE foo (id INT, name TEXT)").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateTable {
                table: "foo".to_string(),
                columns: vec![
                    ("id".to_string(), DataType::Int),
                    ("name".to_string(), DataType::Text),
                ],
            }
        );
    }

    #[test]
    fn parses_create_index() {
        let stmt = parse("CREATE INDEX idx_id ON foo (id)").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateIndex {
                table: "foo".to_string(),
                index: "idx_id".to_string(),
                columns: vec!["id".to_string()],
            }
        );
    }

    #[test]
    fn parses_select_with_where_and_conjunction() {
        let stmt = parse("SELECT id, name FROM foo WHERE id = 1 AND name = 'bob'").unwrap();
        match stmt {
            Statement::Select {
                table,
                columns,
                where_clause,
            } => {
                assert_eq!(table, "foo");
                assert_eq!(columns, Some(vec!["id".to_string(), "name".to_string()]));
                assert!(matches!(where_clause, Some(Expr::And(_, _))));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn parses_select_star() {
        let stmt = parse("SELECT * FROM foo").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: "foo".to_string(),
                columns: None,
                where_clause: None,
            }
        );
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let stmt = parse("INSERT INTO foo (id, name) VALUES (1, 'alice')").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "foo".to_string(),
                columns: Some(vec!["id".to_string(), "name".to_string()]),
                values: vec![Literal::Int(1), Literal::Text("alice".to_string())],
            }
        );
    }

    #[test]
    fn parses_delete_with_where() {
        let stmt = parse("DELETE FROM foo WHERE id = 1").unwrap();
        assert_eq!(
            stmt,
            Statement::Delete {
                table: "foo".to_string(),
                where_clause: Some(Expr::Equals {
                    table: None,
                    column: "id".to_string(),
                    value: Literal::Int(1),
                }),
            }
        );
    }

    #[test]
    fn parses_drop_table_and_index() {
        assert_eq!(
            parse("DROP TABLE foo").unwrap(),
            Statement::DropTable {
                table: "foo".to_string()
            }
        );
        assert_eq!(
            parse("DROP INDEX idx_id ON foo").unwrap(),
            Statement::DropIndex {
                table: "foo".to_string(),
                index: "idx_id".to_string(),
            }
        );
    }

    #[test]
    fn parses_show_variants() {
        assert_eq!(parse("SHOW TABLES").unwrap(), Statement::ShowTables);
        assert_eq!(
            parse("SHOW COLUMNS FROM foo").unwrap(),
            Statement::ShowColumns {
                table: "foo".to_string()
            }
        );
        assert_eq!(
            parse("SHOW INDEX FROM foo").unwrap(),
            Statement::ShowIndex {
                table: "foo".to_string()
            }
        );
    }

    #[test]
    fn qualified_column_reference_is_parsed() {
        let stmt = parse("SELECT * FROM foo WHERE bar.id = 1").unwrap();
        match stmt {
            Statement::Select { where_clause, .. } => {
                assert_eq!(
                    where_clause,
                    Some(Expr::Equals {
                        table: Some("bar".to_string()),
                        column: "id".to_string(),
                        value: Literal::Int(1),
                    })
                );
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn trailing_garbage_is_a_parse_error() {
        assert!(parse("SELECT * FROM foo WHERE id = 1 OR id = 2").is_err());
    }

    #[test]
    fn unknown_statement_keyword_is_a_parse_error() {
        assert!(parse("UPDATE foo SET id = 1").is_err());
    }
}

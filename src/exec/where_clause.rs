//! Flattens a parsed WHERE expression into the equality dictionary the
//! executor and [`crate::plan::EvalPlan`] both consume.

use crate::error::ExecError;
use crate::sql::ast::{Expr, Literal};
use crate::value::{Row, Value};

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(i) => Value::Int(*i),
        Literal::Text(s) => Value::Text(s.clone()),
    }
}

fn collect(expr: &Expr, table: &str, dict: &mut Row) -> Result<(), ExecError> {
    match expr {
        Expr::Equals {
            table: qualifier,
            column,
            value,
        } => {
            if let Some(qualifier) = qualifier {
                if qualifier != table {
                    return Err(ExecError::UnknownTableInWhere(qualifier.clone()));
                }
            }
            dict.insert(column.clone(), literal_value(value));
            Ok(())
        }
        Expr::And(left, right) => {
            collect(left, table, dict)?;
            collect(right, table, dict)
        }
        Expr::Other(what) => Err(ExecError::unsupported(*what)),
    }
}

/// Flatten `expr`'s `AND`-conjunction of equalities into a column-to-value
/// dictionary, validating that any table-qualified column refers to `table`.
pub fn flatten(expr: &Expr, table: &str) -> Result<Row, ExecError> {
    let mut dict = Row::new();
    collect(expr, table, &mut dict)?;
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_and_conjunction() {
        let expr = Expr::And(
            Box::new(Expr::Equals {
                table: None,
                column: "id".to_string(),
                value: Literal::Int(1),
            }),
            Box::new(Expr::Equals {
                table: None,
                column: "name".to_string(),
                value: Literal::Text("bob".to_string()),
            }),
        );
        let dict = flatten(&expr, "t").unwrap();
        assert_eq!(dict.get("id"), Some(&Value::Int(1)));
        assert_eq!(dict.get("name"), Some(&Value::Text("bob".to_string())));
    }

    #[test]
    fn qualifier_matching_from_table_is_fine() {
        let expr = Expr::Equals {
            table: Some("t".to_string()),
            column: "id".to_string(),
            value: Literal::Int(1),
        };
        assert!(flatten(&expr, "t").is_ok());
    }

    #[test]
    fn qualifier_naming_another_table_is_an_error() {
        let expr = Expr::Equals {
            table: Some("other".to_string()),
            column: "id".to_string(),
            value: Literal::Int(1),
        };
        assert!(matches!(
            flatten(&expr, "t").unwrap_err(),
            ExecError::UnknownTableInWhere(_)
        ));
    }
}

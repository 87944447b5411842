//! A small relational algebra tree: scan, select, project, index-lookup.
//! `optimize()` is the only "planner" step — it pushes an equality
//! conjunction down onto a covering index when one exists.

use std::cell::RefCell;
use std::rc::Rc;

use crate::btree::BTreeIndex;
use crate::catalog::Catalog;
use crate::constants::Handle;
use crate::error::ExecError;
use crate::storage::heap_table::HeapTable;
use crate::value::{Row, Value};

/// A node in the evaluation tree. Built by `exec::SQLExec` from a parsed
/// `Statement`, then optionally rewritten by [`EvalPlan::optimize`] before
/// [`EvalPlan::pipeline`]/[`EvalPlan::evaluate`] walk it.
pub enum EvalPlan {
    TableScan {
        table_name: String,
        relation: Rc<RefCell<HeapTable>>,
    },
    Select {
        where_dict: Row,
        child: Box<EvalPlan>,
    },
    Project {
        columns: Vec<String>,
        child: Box<EvalPlan>,
    },
    IndexLookup {
        index: Rc<RefCell<BTreeIndex>>,
        key_dict: Row,
        relation: Rc<RefCell<HeapTable>>,
    },
}

fn row_matches(row: &Row, where_dict: &Row) -> bool {
    where_dict.iter().all(|(k, v)| row.get(k) == Some(v))
}

fn restrict(row: &Row, keys: &[String]) -> Row {
    row.iter()
        .filter(|(k, _)| keys.iter().any(|c| c == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl EvalPlan {
    pub fn table_scan(table_name: impl Into<String>, relation: Rc<RefCell<HeapTable>>) -> Self {
        EvalPlan::TableScan {
            table_name: table_name.into(),
            relation,
        }
    }

    pub fn select(where_dict: Row, child: EvalPlan) -> Self {
        EvalPlan::Select {
            where_dict,
            child: Box::new(child),
        }
    }

    pub fn project(columns: Vec<String>, child: EvalPlan) -> Self {
        EvalPlan::Project {
            columns,
            child: Box::new(child),
        }
    }

    /// The relation this plan reads from, and the handle set it yields.
    /// Used directly by DELETE, which only needs handles.
    pub fn pipeline(&self) -> Result<(Rc<RefCell<HeapTable>>, Vec<Handle>), ExecError> {
        match self {
            EvalPlan::TableScan { relation, .. } => {
                let handles = relation.borrow_mut().select(None)?;
                Ok((relation.clone(), handles))
            }
            EvalPlan::Select { where_dict, child } => {
                let (relation, handles) = child.pipeline()?;
                let mut kept = Vec::new();
                for handle in handles {
                    let row = relation.borrow_mut().project(handle, None)?;
                    if row_matches(&row, where_dict) {
                        kept.push(handle);
                    }
                }
                Ok((relation, kept))
            }
            EvalPlan::Project { child, .. } => child.pipeline(),
            EvalPlan::IndexLookup {
                index,
                key_dict,
                relation,
            } => {
                let handles = index.borrow_mut().lookup(key_dict)?;
                Ok((relation.clone(), handles))
            }
        }
    }

    /// Materialize rows, honoring any [`EvalPlan::Project`] restriction.
    /// Used by SELECT.
    pub fn evaluate(&self) -> Result<Vec<Row>, ExecError> {
        let columns = self.projected_columns();
        let (relation, handles) = self.pipeline()?;
        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            let row = relation.borrow_mut().project(handle, None)?;
            rows.push(match &columns {
                Some(cols) => restrict(&row, cols),
                None => row,
            });
        }
        Ok(rows)
    }

    fn projected_columns(&self) -> Option<Vec<String>> {
        match self {
            EvalPlan::Project { columns, .. } => Some(columns.clone()),
            EvalPlan::Select { child, .. } => child.projected_columns(),
            _ => None,
        }
    }

    /// Rewrite `Select(where_dict, TableScan)` into an `IndexLookup` (with a
    /// residual `Select` for any leftover predicate columns) when `catalog`
    /// has an index whose key columns are all present in `where_dict`.
    /// Every other shape is the identity.
    pub fn optimize(self, catalog: &Catalog) -> Self {
        match self {
            EvalPlan::Project { columns, child } => EvalPlan::Project {
                columns,
                child: Box::new(child.optimize(catalog)),
            },
            EvalPlan::Select { where_dict, child } => match *child {
                EvalPlan::TableScan {
                    table_name,
                    relation,
                } => {
                    if let Some(plan) =
                        Self::try_index_lookup(catalog, &table_name, &relation, &where_dict)
                    {
                        return plan;
                    }
                    EvalPlan::Select {
                        where_dict,
                        child: Box::new(EvalPlan::TableScan {
                            table_name,
                            relation,
                        }),
                    }
                }
                other => EvalPlan::Select {
                    where_dict,
                    child: Box::new(other.optimize(catalog)),
                },
            },
            other => other,
        }
    }

    fn try_index_lookup(
        catalog: &Catalog,
        table_name: &str,
        relation: &Rc<RefCell<HeapTable>>,
        where_dict: &Row,
    ) -> Option<Self> {
        let index_names = catalog.get_index_names(table_name).ok()?;
        for index_name in index_names {
            let index = catalog.get_index(table_name, &index_name).ok()?;
            let key_columns = index.borrow().key_columns().to_vec();
            if key_columns.is_empty() || !key_columns.iter().all(|c| where_dict.contains_key(c)) {
                continue;
            }
            let key_dict: Row = key_columns
                .iter()
                .map(|c| (c.clone(), where_dict[c].clone()))
                .collect();
            let residual: Row = where_dict
                .iter()
                .filter(|(k, _)| !key_columns.contains(k))
                .map(|(k, v): (&String, &Value)| (k.clone(), v.clone()))
                .collect();
            let lookup = EvalPlan::IndexLookup {
                index,
                key_dict,
                relation: relation.clone(),
            };
            return Some(if residual.is_empty() {
                lookup
            } else {
                EvalPlan::Select {
                    where_dict: residual,
                    child: Box::new(lookup),
                }
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;
    use tempfile::tempdir;

    fn cols() -> Vec<(String, DataType)> {
        vec![
            ("id".to_string(), DataType::Int),
            ("name".to_string(), DataType::Text),
        ]
    }

    fn row(id: i32, name: &str) -> Row {
        Row::from([
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::Text(name.to_string())),
        ])
    }

    #[test]
    fn table_scan_evaluate_returns_all_rows() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        table.insert(&row(1, "a")).unwrap();
        table.insert(&row(2, "b")).unwrap();
        let relation = Rc::new(RefCell::new(table));

        let plan = EvalPlan::table_scan("t", relation);
        assert_eq!(plan.evaluate().unwrap().len(), 2);
    }

    #[test]
    fn select_filters_by_equality() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        table.insert(&row(1, "a")).unwrap();
        table.insert(&row(2, "b")).unwrap();
        let relation = Rc::new(RefCell::new(table));

        let where_dict = Row::from([("id".to_string(), Value::Int(2))]);
        let plan = EvalPlan::select(where_dict, EvalPlan::table_scan("t", relation));
        let rows = plan.evaluate().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("b".to_string())));
    }

    #[test]
    fn project_restricts_columns() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        table.insert(&row(1, "a")).unwrap();
        let relation = Rc::new(RefCell::new(table));

        let plan = EvalPlan::project(vec!["name".to_string()], EvalPlan::table_scan("t", relation));
        let rows = plan.evaluate().unwrap();
        assert_eq!(rows[0].len(), 1);
        assert!(rows[0].contains_key("name"));
    }

    #[test]
    fn optimize_without_index_is_identity_shape() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("cat")).unwrap();
        catalog.register_table("t").unwrap();
        catalog.register_column("t", "id", DataType::Int).unwrap();
        catalog.register_column("t", "name", DataType::Text).unwrap();
        HeapTable::create(catalog.dir(), "t", catalog.get_columns("t").unwrap()).unwrap();
        let relation = catalog.get_table("t").unwrap();

        let where_dict = Row::from([("id".to_string(), Value::Int(1))]);
        let plan = EvalPlan::select(where_dict, EvalPlan::table_scan("t", relation));
        let optimized = plan.optimize(&catalog);
        assert!(matches!(optimized, EvalPlan::Select { .. }));
    }

    #[test]
    fn optimize_rewrites_to_index_lookup_when_covered() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("cat")).unwrap();
        catalog.register_table("t").unwrap();
        catalog.register_column("t", "id", DataType::Int).unwrap();
        catalog.register_column("t", "name", DataType::Text).unwrap();
        HeapTable::create(catalog.dir(), "t", catalog.get_columns("t").unwrap()).unwrap();
        let relation = catalog.get_table("t").unwrap();
        relation.borrow_mut().insert(&row(1, "a")).unwrap();

        catalog
            .register_index_column("t", "idx_id", 1, "id", "BTREE", true)
            .unwrap();
        let index = catalog.get_index("t", "idx_id").unwrap();
        {
            let mut rel_mut = relation.borrow_mut();
            index.borrow_mut().create(&mut rel_mut).unwrap();
        }

        let where_dict = Row::from([("id".to_string(), Value::Int(1))]);
        let plan = EvalPlan::select(where_dict, EvalPlan::table_scan("t", relation));
        let optimized = plan.optimize(&catalog);
        assert!(matches!(optimized, EvalPlan::IndexLookup { .. }));
        assert_eq!(optimized.evaluate().unwrap().len(), 1);
    }
}

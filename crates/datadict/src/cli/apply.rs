//! Sequential continue-on-error schema apply.
//!
//! Both write-back and rollback end in the same loop: push a full
//! replacement schema to each target table, never stop on a failure, and
//! fold the results into explicit success/failure lists for reporting.

use datadict_remote::{RemoteError, SchemaApi};
use datadict_schema::ColumnQuad;

/// One table's replacement schema, ready to send.
#[derive(Debug, Clone)]
pub struct TablePayload {
    pub database: String,
    pub table: String,
    pub schema: Vec<ColumnQuad>,
}

impl TablePayload {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Clone)]
pub struct TableSuccess {
    pub database: String,
    pub table: String,
    pub column_count: usize,
}

#[derive(Debug, Clone)]
pub struct TableFailure {
    pub database: String,
    pub table: String,
    pub error: String,
    pub status_code: Option<u16>,
    pub retryable: bool,
}

/// Outcome of one apply pass over a set of tables.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub successes: Vec<TableSuccess>,
    pub failures: Vec<TableFailure>,
}

impl ApplyOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply every payload in order. A failing table is recorded and the loop
/// moves on; the caller decides what the mix of results means.
pub async fn apply_tables(api: &dyn SchemaApi, payloads: &[TablePayload]) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    for payload in payloads {
        let name = payload.qualified_name();
        match api
            .update_schema(&payload.database, &payload.table, &payload.schema)
            .await
        {
            Ok(()) => {
                tracing::info!(table = %name, columns = payload.schema.len(), "Schema updated");
                println!("  ✓ {name}");
                outcome.successes.push(TableSuccess {
                    database: payload.database.clone(),
                    table: payload.table.clone(),
                    column_count: payload.schema.len(),
                });
            }
            Err(err) => {
                tracing::error!(table = %name, error = %err, "Schema update failed");
                println!("  ✗ {name}");
                println!("    Error: {err}");
                outcome.failures.push(failure_from_error(payload, &err));
            }
        }
    }

    outcome
}

fn failure_from_error(payload: &TablePayload, err: &RemoteError) -> TableFailure {
    TableFailure {
        database: payload.database.clone(),
        table: payload.table.clone(),
        error: err.to_string(),
        status_code: err.status_code(),
        retryable: err.is_retryable(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory SchemaApi fake shared by the orchestration tests.

    use async_trait::async_trait;
    use datadict_remote::{RemoteError, SchemaApi};
    use datadict_schema::{ColumnQuad, ColumnTriple};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeApi {
        pub schemas: Mutex<HashMap<(String, String), Vec<ColumnTriple>>>,
        pub failing: HashSet<String>,
        pub failure_status: u16,
    }

    impl FakeApi {
        pub fn new() -> Self {
            Self {
                failure_status: 500,
                ..Self::default()
            }
        }

        pub fn with_table(self, database: &str, table: &str, schema: Vec<ColumnTriple>) -> Self {
            self.schemas
                .lock()
                .unwrap()
                .insert((database.to_string(), table.to_string()), schema);
            self
        }

        pub fn failing_on(mut self, table: &str) -> Self {
            self.failing.insert(table.to_string());
            self
        }

        pub fn schema_of(&self, database: &str, table: &str) -> Vec<ColumnTriple> {
            self.schemas
                .lock()
                .unwrap()
                .get(&(database.to_string(), table.to_string()))
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SchemaApi for FakeApi {
        async fn fetch_schema(
            &self,
            database: &str,
            table: &str,
        ) -> Result<Vec<ColumnTriple>, RemoteError> {
            self.schemas
                .lock()
                .unwrap()
                .get(&(database.to_string(), table.to_string()))
                .cloned()
                .ok_or_else(|| RemoteError::TableNotFound {
                    database: database.to_string(),
                    table: table.to_string(),
                })
        }

        async fn update_schema(
            &self,
            database: &str,
            table: &str,
            schema: &[ColumnQuad],
        ) -> Result<(), RemoteError> {
            if self.failing.contains(table) {
                return Err(RemoteError::Status {
                    status: self.failure_status,
                    detail: "injected failure".to_string(),
                });
            }
            self.schemas.lock().unwrap().insert(
                (database.to_string(), table.to_string()),
                schema.iter().map(|quad| quad.to_triple()).collect(),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeApi;
    use super::*;
    use datadict_schema::ColumnTriple;

    fn payload(table: &str, description: &str) -> TablePayload {
        TablePayload {
            database: "prod_db".to_string(),
            table: table.to_string(),
            schema: vec![ColumnQuad(
                "customer_id".to_string(),
                "string".to_string(),
                None,
                description.to_string(),
            )],
        }
    }

    #[tokio::test]
    async fn test_apply_continues_past_failures() {
        let api = FakeApi::new()
            .with_table("prod_db", "customers", vec![])
            .with_table("prod_db", "orders", vec![])
            .with_table("prod_db", "events", vec![])
            .failing_on("orders");

        let payloads = vec![
            payload("customers", "ok one"),
            payload("orders", "will fail"),
            payload("events", "ok two"),
        ];
        let outcome = apply_tables(&api, &payloads).await;

        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].table, "orders");
        assert_eq!(outcome.failures[0].status_code, Some(500));
        assert!(outcome.failures[0].retryable);

        // Succeeding tables kept their committed updates.
        assert_eq!(
            api.schema_of("prod_db", "events")[0],
            ColumnTriple("customer_id".to_string(), "string".to_string(), "ok two".to_string())
        );
    }

    #[tokio::test]
    async fn test_apply_all_success() {
        let api = FakeApi::new().with_table("prod_db", "customers", vec![]);
        let outcome = apply_tables(&api, &[payload("customers", "desc")]).await;
        assert!(outcome.all_succeeded());
        assert_eq!(outcome.successes[0].column_count, 1);
    }
}

//! Command dispatch for `POST /api/receive`.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::routes::AppState;
use crate::error::{Result, StoreError};

pub const UNKNOWN_COMMAND_MESSAGE: &str = "Received unknown command or data";

/// Run one received command and build its response body.
///
/// Unknown commands, and bodies with no `command` key, are remembered as the
/// last received payload.
pub async fn handle_command(state: &AppState, body: Value) -> Result<Value> {
    let obj = match body.as_object() {
        Some(obj) if !obj.is_empty() => obj,
        _ => return Err(StoreError::InvalidRequest("No JSON data provided".into())),
    };
    let command = obj.get("command").and_then(Value::as_str).unwrap_or("none");
    debug!("Received command '{}'", command);

    match command {
        "get_appr" => {
            let store_id = required_key(obj, "StoreID")?;
            *state.last_received.write().await = Some(Value::String(store_id.clone()));
            table_payload(state, &state.config.store_table(&store_id)).await
        }
        "get_stores" => table_payload(state, &state.config.stores_table).await,
        "covered?" => {
            let barcode = required_key(obj, "Barcode")?;
            let store_id = required_key(obj, "StoreID")?;
            covered(state, &barcode, &store_id).await
        }
        _ => {
            *state.last_received.write().await = Some(body.clone());
            Ok(json!({ "message": UNKNOWN_COMMAND_MESSAGE }))
        }
    }
}

/// A string-valued key. Numeric ids are accepted and rendered as text.
fn required_key(obj: &Map<String, Value>, key: &str) -> Result<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::InvalidRequest(format!("missing '{}'", key))),
    }
}

async fn table_payload(state: &AppState, table: &str) -> Result<Value> {
    let rows = state.store.table_rows(table).await?;
    Ok(json!({ "payload": rows }))
}

/// Is `barcode` approved for the store? Falls back to the reference table
/// for a product name when it is not.
async fn covered(state: &AppState, barcode: &str, store_id: &str) -> Result<Value> {
    let cfg = &state.config;
    let store_table = cfg.store_table(store_id);

    if let Some(name) = state
        .store
        .lookup(&store_table, &cfg.store_name_column, &cfg.store_key_column, barcode)
        .await?
    {
        info!("{} is covered by {}", barcode, store_table);
        return Ok(json!({ "Response": "Yes", "Barcode": barcode, "Name": name }));
    }

    let reference = state
        .store
        .lookup(
            &cfg.reference_table,
            &cfg.reference_name_column,
            &cfg.reference_key_column,
            barcode,
        )
        .await?;

    Ok(match reference {
        Some(name) => json!({ "Response": "No", "Barcode": barcode, "Name": name }),
        None => json!({ "Response": "No", "Barcode": "None", "Name": "None" }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::{ColumnSpec, DeclaredType};
    use crate::drivers::MemoryStore;
    use std::sync::Arc;

    fn varchar(name: &str) -> ColumnSpec {
        ColumnSpec::new(name, DeclaredType::VarChar(255))
    }

    fn state() -> AppState {
        let store = MemoryStore::new();
        store.seed_table(
            "eanref",
            vec![
                varchar("code").primary_key(),
                ColumnSpec::new("product_name", DeclaredType::MediumText),
            ],
            vec![
                vec!["111".into(), "Oat Milk".into()],
                vec!["222".into(), "Rye Bread".into()],
            ],
        );
        store.seed_table(
            "store_7",
            vec![varchar("Barcode").primary_key(), varchar("Name")],
            vec![vec!["111".into(), "Oat Milk 1L".into()]],
        );
        store.seed_table(
            "stores",
            vec![varchar("StoreID").primary_key(), varchar("Name")],
            vec![vec!["7".into(), "Corner Shop".into()]],
        );
        AppState::new(Arc::new(store), ServerConfig::default())
    }

    #[tokio::test]
    async fn test_covered_in_store() {
        let state = state();
        let resp = handle_command(
            &state,
            json!({"command": "covered?", "Barcode": "111", "StoreID": "7"}),
        )
        .await
        .unwrap();
        assert_eq!(resp, json!({"Response": "Yes", "Barcode": "111", "Name": "Oat Milk 1L"}));
    }

    #[tokio::test]
    async fn test_not_covered_falls_back_to_reference() {
        let state = state();
        let resp = handle_command(
            &state,
            json!({"command": "covered?", "Barcode": "222", "StoreID": 7}),
        )
        .await
        .unwrap();
        assert_eq!(resp, json!({"Response": "No", "Barcode": "222", "Name": "Rye Bread"}));
    }

    #[tokio::test]
    async fn test_unknown_barcode() {
        let state = state();
        let resp = handle_command(
            &state,
            json!({"command": "covered?", "Barcode": "999", "StoreID": "7"}),
        )
        .await
        .unwrap();
        assert_eq!(resp, json!({"Response": "No", "Barcode": "None", "Name": "None"}));
    }

    #[tokio::test]
    async fn test_covered_for_unknown_store_uses_reference() {
        let state = state();
        let resp = handle_command(
            &state,
            json!({"command": "covered?", "Barcode": "111", "StoreID": "42"}),
        )
        .await
        .unwrap();
        assert_eq!(resp["Response"], "No");
        assert_eq!(resp["Name"], "Oat Milk");
    }

    #[tokio::test]
    async fn test_get_appr_returns_store_rows_and_remembers_id() {
        let state = state();
        let resp = handle_command(&state, json!({"command": "get_appr", "StoreID": "7"}))
            .await
            .unwrap();
        assert_eq!(resp, json!({"payload": [{"Barcode": "111", "Name": "Oat Milk 1L"}]}));
        assert_eq!(*state.last_received.read().await, Some(json!("7")));
    }

    #[tokio::test]
    async fn test_get_appr_unknown_store_is_not_found() {
        let state = state();
        let err = handle_command(&state, json!({"command": "get_appr", "StoreID": "99"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_stores() {
        let state = state();
        let resp = handle_command(&state, json!({"command": "get_stores"}))
            .await
            .unwrap();
        assert_eq!(resp["payload"][0]["Name"], "Corner Shop");
    }

    #[tokio::test]
    async fn test_unknown_command_is_remembered() {
        let state = state();
        let body = json!({"temperature": 21.5});
        let resp = handle_command(&state, body.clone()).await.unwrap();
        assert_eq!(resp, json!({"message": UNKNOWN_COMMAND_MESSAGE}));
        assert_eq!(*state.last_received.read().await, Some(body));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let state = state();
        for body in [json!({}), json!([1, 2]), json!(null)] {
            let err = handle_command(&state, body).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidRequest(_)));
        }
        let err = handle_command(&state, json!({"command": "covered?", "Barcode": "111"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("StoreID"));
    }
}

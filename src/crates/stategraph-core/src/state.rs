//! State schema and reducer system for graph workflows.
//!
//! Every graph threads a single JSON state record through its stages. A
//! stage returns a *partial* update; the [`StateSchema`] decides, field by
//! field, how that update is merged into the record. Two merge policies
//! cover this engine's needs:
//!
//! | Reducer | Behavior | Use case |
//! |---------|----------|----------|
//! | [`OverwriteReducer`] | Last write wins | Scalars, wholesale-replaced lists |
//! | [`AppendReducer`] | Concatenate onto an array | Dialogue, collected sections |
//!
//! Append merges are monotonic: entries are only ever added at the tail,
//! never removed or reordered. Fields without a declared reducer fall back
//! to overwrite.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during state operations
#[derive(Debug, Error)]
pub enum StateError {
    /// State structure is invalid (e.g., not an object when expected)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reducer encountered incompatible types or failed to merge
    #[error("Reducer error: {0}")]
    ReducerError(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Trait for reducing/merging state values.
///
/// A reducer combines the current value of a field with a stage's update
/// for that field. Reducers must be deterministic and side-effect free.
pub trait Reducer: Send + Sync {
    /// Apply an update to the current value (`current` may be null when the
    /// field has never been written).
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Human-readable name for this reducer
    fn name(&self) -> &str;
}

/// Overwrite reducer - replaces the current value with the update.
///
/// The default policy for fields without an explicit reducer.
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Append reducer - concatenates the update onto the current array.
///
/// A scalar update is appended as a single element; a null current value
/// initializes the array. Existing entries are never touched.
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut result = curr.clone();
                result.extend_from_slice(upd);
                Ok(Value::Array(result))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut result = curr.clone();
                result.push(single.clone());
                Ok(Value::Array(result))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            _ => Err(StateError::ReducerError(
                "AppendReducer requires array values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// State schema declaring each field's merge policy.
#[derive(Default)]
pub struct StateSchema {
    /// Map of field name to reducer
    fields: HashMap<String, Box<dyn Reducer>>,
}

impl StateSchema {
    /// Create a new empty state schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a specific reducer
    pub fn add_field(&mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) {
        self.fields.insert(field_name.into(), reducer);
    }

    /// Builder-style variant of [`add_field`](Self::add_field)
    pub fn with_field(mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.add_field(field_name, reducer);
        self
    }

    /// Apply a stage's partial update to the state record in place.
    ///
    /// Each field in the update is merged through its declared reducer;
    /// undeclared fields are overwritten. Either the entire update applies
    /// or an error is returned with the state untouched beyond the fields
    /// already merged — callers treat any error as fatal for the superstep,
    /// so a partially merged record is never observed.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("State must be an object".to_string()))?;

        let update_obj = update
            .as_object()
            .ok_or_else(|| StateError::InvalidState("Update must be an object".to_string()))?;

        for (field_name, update_value) in update_obj {
            let current_value = state_obj.get(field_name).cloned().unwrap_or(Value::Null);

            let reduced_value = match self.fields.get(field_name) {
                Some(reducer) => reducer.reduce(&current_value, update_value)?,
                None => update_value.clone(),
            };

            state_obj.insert(field_name.clone(), reduced_value);
        }

        Ok(())
    }

    /// Names of the fields declared in this schema
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_reducer() {
        let reducer = OverwriteReducer;
        let result = reducer.reduce(&json!("old"), &json!("new")).unwrap();
        assert_eq!(result, json!("new"));
    }

    #[test]
    fn test_append_reducer_arrays() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!([1, 2]), &json!([3])).unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn test_append_reducer_null_current() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&Value::Null, &json!(["first"])).unwrap();
        assert_eq!(result, json!(["first"]));
    }

    #[test]
    fn test_append_reducer_single_value() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!([1, 2]), &json!(3)).unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn test_append_reducer_rejects_non_array() {
        let reducer = AppendReducer;
        assert!(reducer.reduce(&json!(42), &json!("x")).is_err());
    }

    #[test]
    fn test_append_is_monotonic() {
        // Once-appended entries stay in place across further merges.
        let reducer = AppendReducer;
        let mut value = Value::Null;
        for i in 0..5 {
            value = reducer.reduce(&value, &json!([i])).unwrap();
        }
        assert_eq!(value, json!([0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_schema_apply_mixed_fields() {
        let schema = StateSchema::new()
            .with_field("sections", Box::new(AppendReducer))
            .with_field("topic", Box::new(OverwriteReducer));

        let mut state = json!({"sections": ["a"], "topic": "old"});
        schema
            .apply(&mut state, &json!({"sections": ["b"], "topic": "new"}))
            .unwrap();

        assert_eq!(state["sections"], json!(["a", "b"]));
        assert_eq!(state["topic"], json!("new"));
    }

    #[test]
    fn test_schema_undeclared_field_overwrites() {
        let schema = StateSchema::new();
        let mut state = json!({"field": "old"});
        schema
            .apply(&mut state, &json!({"field": "new", "other": 1}))
            .unwrap();

        assert_eq!(state["field"], json!("new"));
        assert_eq!(state["other"], json!(1));
    }

    #[test]
    fn test_schema_rejects_non_object_state() {
        let schema = StateSchema::new();
        let mut state = json!("not an object");
        assert!(schema.apply(&mut state, &json!({})).is_err());
    }
}

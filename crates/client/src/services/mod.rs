//! Domain services: one domain operation, one HTTP call.
//!
//! Services unwrap the `{success, message, data}` envelope and decode `data`
//! into the one shape declared for the entity. They hold no state.
use std::marker::PhantomData;

use api_types::envelope::Envelope;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{ClientError, Result},
    http::Client,
    resource::{ListFilters, Resource, SearchCriteria},
};

pub mod auth;
mod catalog;
mod parties;
mod sales;
mod stock;

/// Returns `data`, or the server's reason when `success` is false.
///
/// A `null` payload counts as absent.
pub(crate) fn into_data(envelope: Envelope<Value>) -> Result<Option<Value>> {
    if !envelope.success {
        return Err(ClientError::server(None, envelope.message));
    }
    Ok(envelope.data.filter(|data| !data.is_null()))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Decodes a list payload. An absent payload is an empty list; anything but a
/// JSON array is an [`ClientError::UnexpectedShape`].
pub(crate) fn decode_list<T: DeserializeOwned>(
    name: &str,
    envelope: Envelope<Value>,
) -> Result<Vec<T>> {
    match into_data(envelope)? {
        None => Ok(Vec::new()),
        Some(data @ Value::Array(_)) => serde_json::from_value(data)
            .map_err(|err| ClientError::UnexpectedShape(format!("list of {name}: {err}"))),
        Some(other) => Err(ClientError::UnexpectedShape(format!(
            "expected a list of {name}, got {}",
            describe(&other)
        ))),
    }
}

/// Decodes a single record, `None` when the server returned no payload.
pub(crate) fn decode_optional<T: DeserializeOwned>(
    name: &str,
    envelope: Envelope<Value>,
) -> Result<Option<T>> {
    match into_data(envelope)? {
        None => Ok(None),
        Some(data @ Value::Object(_)) => serde_json::from_value(data)
            .map(Some)
            .map_err(|err| ClientError::UnexpectedShape(format!("{name}: {err}"))),
        Some(other) => Err(ClientError::UnexpectedShape(format!(
            "expected one {name}, got {}",
            describe(&other)
        ))),
    }
}

/// Decodes a single record that must be present.
pub(crate) fn decode_one<T: DeserializeOwned>(name: &str, envelope: Envelope<Value>) -> Result<T> {
    decode_optional(name, envelope)?
        .ok_or_else(|| ClientError::UnexpectedShape(format!("missing {name} in response")))
}

/// Maps a 404 on a singular lookup to "no match".
pub(crate) fn not_found_as_none<T>(result: Result<Option<T>>) -> Result<Option<T>> {
    match result {
        Err(err) if err.is_not_found() => Ok(None),
        other => other,
    }
}

/// Exact lookup of `<path>/<value>`; a 404 or a value that cannot name a
/// record is "no match".
pub(crate) async fn lookup<T: DeserializeOwned>(
    client: &Client,
    name: &str,
    path: &str,
    value: &str,
) -> Result<Option<T>> {
    let value = value.trim();
    if matches!(value, "" | "." | "..") {
        return Ok(None);
    }
    let result = client
        .get_value(path, value)
        .await
        .and_then(|envelope| decode_optional(name, envelope));
    not_found_as_none(result)
}

/// CRUD and search over one entity.
pub struct Resources<'a, T> {
    client: &'a Client,
    _entity: PhantomData<T>,
}

impl Client {
    pub fn resources<T: Resource>(&self) -> Resources<'_, T> {
        Resources {
            client: self,
            _entity: PhantomData,
        }
    }
}

impl<T: Resource> Resources<'_, T> {
    pub async fn list(&self, filters: &ListFilters) -> Result<Vec<T>> {
        let envelope = self.client.get(T::PATH, &filters.params()).await?;
        decode_list(T::NAME, envelope)
    }

    /// `None` when the record does not exist.
    pub async fn get(&self, key: &T::Key) -> Result<Option<T>> {
        let result = self
            .client
            .get(&T::item_path(key), &[])
            .await
            .and_then(|envelope| decode_optional(T::NAME, envelope));
        not_found_as_none(result)
    }

    pub async fn create(&self, draft: &T::Draft) -> Result<T> {
        let envelope = self.client.post(T::PATH, draft).await?;
        decode_one(T::NAME, envelope)
    }

    pub async fn update(&self, key: &T::Key, draft: &T::Draft) -> Result<T> {
        let envelope = self.client.put(&T::item_path(key), draft).await?;
        decode_one(T::NAME, envelope)
    }

    pub async fn delete(&self, key: &T::Key) -> Result<()> {
        let envelope = self.client.delete(&T::item_path(key)).await?;
        into_data(envelope).map(|_| ())
    }

    /// Searches `<path>/buscar`; no match is an empty list.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<T>> {
        let path = format!("{}/buscar", T::PATH);
        let result = self
            .client
            .get(&path, &criteria.params())
            .await
            .and_then(|envelope| decode_list(T::NAME, envelope));
        match result {
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub(crate) fn client(&self) -> &Client {
        self.client
    }
}

#[cfg(test)]
mod tests {
    use api_types::{BranchId, product::Product};
    use serde_json::json;

    use super::*;

    fn envelope(value: Value) -> Envelope<Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn failed_envelope_carries_server_message() {
        let err = decode_list::<Product>(
            "product",
            envelope(json!({"success": false, "message": "Sin permisos"})),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Sin permisos");
    }

    #[test]
    fn absent_list_payload_is_empty() {
        let items: Vec<Product> =
            decode_list("product", envelope(json!({"success": true}))).unwrap();
        assert!(items.is_empty());
        let items: Vec<Product> =
            decode_list("product", envelope(json!({"success": true, "data": null}))).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn nested_list_shape_is_rejected_loudly() {
        let err = decode_list::<Product>(
            "product",
            envelope(json!({"success": true, "data": {"productos": []}})),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape(_)));
    }

    #[test]
    fn decodes_product_list() {
        let items: Vec<Product> = decode_list(
            "product",
            envelope(json!({"success": true, "data": [
                {"id": 1, "code": "A1", "name": "Esponja", "price": 150.5, "branchId": 3, "stock": 10}
            ]})),
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price.cents(), 15050);
        assert_eq!(items[0].branch_id, Some(BranchId(3)));
    }

    #[test]
    fn missing_single_record_is_none() {
        let product: Option<Product> =
            decode_optional("product", envelope(json!({"success": true, "data": null}))).unwrap();
        assert!(product.is_none());
        let err = decode_one::<Product>("product", envelope(json!({"success": true}))).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape(_)));
    }
}

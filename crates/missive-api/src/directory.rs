//! Contact directory endpoints.

use serde_json::{json, Value};

use missive_shared::{Contact, Result, UserId};

use crate::ApiClient;

impl ApiClient {
    /// Fetch the contact directory, in server order.
    pub async fn contacts(&self, token: &str) -> Result<Vec<Contact>> {
        let body = self
            .send(self.get(self.url("api/auth/contacts")?, Some(token)))
            .await?;
        Ok(extract_contact_list(&body))
    }

    pub async fn add_contact(&self, token: &str, contact_id: &UserId) -> Result<()> {
        self.send(
            self.post(self.url("api/auth/add-contact")?, Some(token))
                .json(&json!({ "contactId": contact_id })),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_contact(&self, token: &str, contact_id: &UserId) -> Result<()> {
        self.send(
            self.post(self.url("api/auth/delete-contact")?, Some(token))
                .json(&json!({ "contactId": contact_id })),
        )
        .await?;
        Ok(())
    }
}

/// Normalize the directory response shape.
///
/// The endpoint has been observed returning a plain array, an object
/// wrapping the array under a known key, and (defensively) any object
/// whose values include one array. The fallback chain is total and
/// explicitly ordered:
///
/// 1. the body itself, if it is an array
/// 2. a known wrapper key (`contacts`, `data`, `results`), in that order
/// 3. the first array-valued field of the object, in field order
/// 4. otherwise, empty
///
/// Entries that fail to normalize (no id, no email) are discarded.
pub(crate) fn extract_contact_list(body: &Value) -> Vec<Contact> {
    const WRAPPER_KEYS: [&str; 3] = ["contacts", "data", "results"];

    let items: &Vec<Value> = if let Some(array) = body.as_array() {
        array
    } else if let Some(obj) = body.as_object() {
        let known = WRAPPER_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array));
        match known.or_else(|| obj.values().find_map(Value::as_array)) {
            Some(array) => array,
            None => return Vec::new(),
        }
    } else {
        return Vec::new();
    };

    items.iter().filter_map(Contact::from_value).collect()
}

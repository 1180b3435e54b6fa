//! Message history endpoint.

use serde_json::Value;

use missive_shared::{Message, Result, UserId};

use crate::ApiClient;

impl ApiClient {
    /// Fetch the message history for the conversation between `user_id`
    /// and `peer_id`, oldest first (server order).
    ///
    /// A body that is not an array yields an empty history rather than an
    /// error; entries that fail to normalize are skipped.
    pub async fn history(
        &self,
        token: &str,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>> {
        let mut url = self.url("api/messages")?;
        url.query_pairs_mut()
            .append_pair("userId", user_id.as_str())
            .append_pair("to", peer_id.as_str());

        let body = self.send(self.get(url, Some(token))).await?;
        let messages = match body.as_array() {
            Some(items) => items.iter().filter_map(Message::from_value).collect(),
            None => {
                tracing::warn!("history response was not an array, treating as empty");
                Vec::new()
            }
        };
        Ok(messages)
    }
}

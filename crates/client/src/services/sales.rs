use api_types::sale::Sale;

use super::{Resources, decode_one};
use crate::{error::Result, resource::Resource};

impl Resources<'_, Sale> {
    /// Cancels a sale; the server answers with the updated record.
    pub async fn cancel(&self, id: i64) -> Result<Sale> {
        let path = format!("{}/anular", Sale::item_path(&id));
        let envelope = self.client().post(&path, &serde_json::json!({})).await?;
        decode_one(Sale::NAME, envelope)
    }
}

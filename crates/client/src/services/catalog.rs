use api_types::product::Product;

use super::{Resources, lookup};
use crate::{error::Result, resource::Resource};

impl Resources<'_, Product> {
    /// Exact lookup by product code, scoped to the effective branch.
    pub async fn by_code(&self, code: &str) -> Result<Option<Product>> {
        let path = format!("{}/codigo", Product::PATH);
        lookup(self.client(), Product::NAME, &path, code).await
    }
}

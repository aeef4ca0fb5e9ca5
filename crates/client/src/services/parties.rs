use api_types::party::{Client, Supplier};

use super::{Resources, lookup};
use crate::{error::Result, resource::Resource};

async fn lookup_by_document<T: Resource>(
    resources: &Resources<'_, T>,
    document: &str,
) -> Result<Option<T>> {
    let path = format!("{}/documento", T::PATH);
    lookup(resources.client(), T::NAME, &path, document).await
}

impl Resources<'_, Client> {
    pub async fn by_document(&self, document: &str) -> Result<Option<Client>> {
        lookup_by_document(self, document).await
    }
}

impl Resources<'_, Supplier> {
    pub async fn by_document(&self, document: &str) -> Result<Option<Supplier>> {
        lookup_by_document(self, document).await
    }
}

use api_types::{
    BranchId,
    stock::{StockAdjustment, StockByBranch},
};

use super::{Resources, decode_list, decode_one};
use crate::{
    error::Result,
    resource::{Resource, StockKey},
};

impl Resources<'_, StockByBranch> {
    /// Stock of one branch, regardless of the branch header.
    pub async fn for_branch(&self, branch: BranchId) -> Result<Vec<StockByBranch>> {
        let path = format!("{}/sucursal/{branch}", StockByBranch::PATH);
        let envelope = self.client().get(&path, &[]).await?;
        decode_list(StockByBranch::NAME, envelope)
    }

    pub async fn adjust(
        &self,
        key: &StockKey,
        adjustment: &StockAdjustment,
    ) -> Result<StockByBranch> {
        let path = format!("{}/ajuste", StockByBranch::item_path(key));
        let envelope = self.client().post(&path, adjustment).await?;
        decode_one(StockByBranch::NAME, envelope)
    }
}

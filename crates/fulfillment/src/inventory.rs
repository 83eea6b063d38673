//! License-key inventory administration.

use common::{LicenseKeyId, ProductId};
use domain::{LicenseKey, ValidationError, normalize_secrets};
use store::{KeyImport, Ledger};

use crate::error::Result;

/// Admin operations on the key inventory.
///
/// Imports and deletions only ever recompute the stock cache from the key
/// table; they never adjust it by a delta.
#[derive(Clone)]
pub struct InventoryService<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> InventoryService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Imports keys for a product.
    ///
    /// Secrets are trimmed; blanks and repeats are dropped before they reach
    /// the store, which additionally skips secrets the product already has.
    #[tracing::instrument(skip(self, secrets))]
    pub async fn add_keys<I, S>(&self, product_id: ProductId, secrets: I) -> Result<KeyImport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let secrets = normalize_secrets(secrets);
        if secrets.is_empty() {
            return Err(ValidationError::EmptyKeyBatch.into());
        }

        let import = self.ledger.add_keys(product_id, &secrets).await?;
        metrics::counter!("inventory_keys_added_total").increment(import.added as u64);
        tracing::info!(
            submitted = secrets.len(),
            added = import.added,
            stock = import.stock,
            "license keys imported"
        );
        Ok(import)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_key(&self, key_id: LicenseKeyId) -> Result<LicenseKey> {
        let key = self.ledger.delete_key(key_id).await?;
        tracing::info!(product_id = %key.product_id, "license key deleted");
        Ok(key)
    }

    pub async fn list_keys(
        &self,
        product_id: Option<ProductId>,
        limit: usize,
    ) -> Result<Vec<LicenseKey>> {
        Ok(self.ledger.list_keys(product_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use domain::{Money, NewProduct};
    use store::{Catalog, InMemoryLedger};

    use super::*;
    use crate::error::FulfillmentError;

    async fn setup() -> (InventoryService<InMemoryLedger>, InMemoryLedger, ProductId) {
        let ledger = InMemoryLedger::new();
        let product = ledger
            .create_product(NewProduct::new("Photo Suite", Money::from_major(1499)))
            .await
            .unwrap();
        (InventoryService::new(ledger.clone()), ledger, product.id)
    }

    #[tokio::test]
    async fn test_batch_duplicates_are_skipped() {
        let (service, ledger, product_id) = setup().await;

        let import = service
            .add_keys(product_id, ["k1", "k1", "k2"])
            .await
            .unwrap();

        assert_eq!(import, KeyImport { added: 2, stock: 2 });
        let cached = ledger.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(cached.available_stock, 2);
    }

    #[tokio::test]
    async fn test_blank_batch_is_rejected() {
        let (service, _, product_id) = setup().await;
        let result = service.add_keys(product_id, ["", "   "]).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::Validation(ValidationError::EmptyKeyBatch))
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_is_reported() {
        let (service, _, _) = setup().await;
        let result = service.add_keys(ProductId::new(999), ["k1"]).await;
        assert!(matches!(result, Err(FulfillmentError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (service, _, product_id) = setup().await;
        service.add_keys(product_id, ["a", "b"]).await.unwrap();

        let keys = service.list_keys(Some(product_id), 10).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].secret, "b");

        service.delete_key(keys[0].id).await.unwrap();
        assert!(matches!(
            service.delete_key(keys[0].id).await,
            Err(FulfillmentError::KeyNotFound(_))
        ));
        assert_eq!(service.list_keys(None, 10).await.unwrap().len(), 1);
    }
}

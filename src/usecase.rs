//! Usecases: the only place a missing row becomes `NotFound`.

use crate::context::Context;
use crate::error::UsecaseError;
use crate::model::{Changeset, Instance, Record};
use crate::operation::Operation;
use crate::repository::{Page, ResourceRepository};
use std::collections::BTreeSet;
use uuid::Uuid;

pub struct ResourceUsecases {
    repo: ResourceRepository,
    bound: BTreeSet<Operation>,
}

impl ResourceUsecases {
    pub fn new(repo: ResourceRepository, bound: BTreeSet<Operation>) -> Self {
        ResourceUsecases { repo, bound }
    }

    pub fn is_bound(&self, op: Operation) -> bool {
        self.bound.contains(&op)
    }

    fn require(&self, op: Operation) -> Result<(), UsecaseError> {
        if self.is_bound(op) {
            Ok(())
        } else {
            Err(UsecaseError::Unbound(op))
        }
    }

    pub async fn get_one(&self, ctx: &Context, id: Uuid) -> Result<Record, UsecaseError> {
        self.require(Operation::GetOne)?;
        found(self.repo.get_one(ctx, id).await?)
    }

    pub async fn get_many(&self, ctx: &Context, page: Page) -> Result<Vec<Record>, UsecaseError> {
        self.require(Operation::GetMany)?;
        Ok(self.repo.get_many(ctx, page).await?)
    }

    pub async fn post(&self, ctx: &Context, data: &Instance) -> Result<Record, UsecaseError> {
        self.require(Operation::Post)?;
        found(self.repo.post(ctx, data).await?)
    }

    pub async fn patch(
        &self,
        ctx: &Context,
        id: Uuid,
        data: &Changeset,
    ) -> Result<Record, UsecaseError> {
        self.require(Operation::Patch)?;
        found(self.repo.patch(ctx, id, data).await?)
    }

    pub async fn delete(&self, ctx: &Context, id: Uuid) -> Result<Record, UsecaseError> {
        self.require(Operation::Delete)?;
        found(self.repo.delete(ctx, id).await?)
    }
}

fn found(row: Option<Record>) -> Result<Record, UsecaseError> {
    row.ok_or(UsecaseError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::sql::Dialect;
    use crate::store::{MemoryBackend, SqlBackend};
    use std::sync::Arc;
    use std::time::Duration;

    const SPEC: &str = r#"{
        "services": [{"name": "main", "type": "sql", "driver": "memory"}],
        "resources": [{
            "name": "Tag", "table_name": "tags", "methods": ["get_one"],
            "model": {"id": "identifier", "label": "string"},
            "backing_service": "main"
        }]
    }"#;

    fn usecases(bound: &[Operation]) -> (ResourceUsecases, Context) {
        let spec = load_from_str(SPEC).unwrap();
        let repo = ResourceRepository::new(&spec.resources[0], Dialect::Postgres, Duration::from_secs(5));
        let store: Arc<dyn SqlBackend> = Arc::new(MemoryBackend::new(Dialect::Postgres));
        (
            ResourceUsecases::new(repo, bound.iter().copied().collect()),
            Context::new(store, reqwest::Client::new()),
        )
    }

    #[tokio::test]
    async fn absence_becomes_not_found() {
        let (uc, ctx) = usecases(&[Operation::GetOne, Operation::Delete]);
        assert!(matches!(
            uc.get_one(&ctx, Uuid::new_v4()).await,
            Err(UsecaseError::NotFound)
        ));
        assert!(matches!(
            uc.delete(&ctx, Uuid::new_v4()).await,
            Err(UsecaseError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unbound_operation_is_reported() {
        let (uc, ctx) = usecases(&[Operation::GetOne]);
        assert!(matches!(
            uc.get_many(&ctx, Page::default()).await,
            Err(UsecaseError::Unbound(Operation::GetMany))
        ));
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let (uc, ctx) = usecases(&[Operation::GetMany]);
        assert!(uc.get_many(&ctx, Page::default()).await.unwrap().is_empty());
    }
}

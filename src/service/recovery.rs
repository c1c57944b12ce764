//! Create with conflict recovery: a create that collides with a soft-deleted row revives that row.

use super::Repository;
use crate::config::ResolvedEntity;
use crate::error::{AppError, StoreError};
use crate::query::Predicate;
use crate::store::Row;

/// Insert `attrs`. On a unique violation against a soft-deleted row, restore that row, merge `attrs`
/// into it and return the refreshed row with its original primary key. Live conflicts are 409.
pub async fn create_or_restore(repo: &Repository<'_>, entity: &ResolvedEntity, attrs: Row) -> Result<Row, AppError> {
    let fields = match repo.create(entity, &attrs).await {
        Ok(row) => return Ok(row),
        Err(StoreError::UniqueViolation { fields }) => fields,
        Err(e) => return Err(e.into()),
    };
    let conflict = || AppError::Conflict(format!("{} already exists with these ({})", entity.name, fields.join(", ")));

    let Some(sd) = &entity.soft_delete else {
        return Err(conflict());
    };
    let Some(predicate) = conflict_predicate(&fields, &attrs) else {
        return Err(conflict());
    };
    let Some(existing) = repo.find_one_with_deleted(entity, predicate).await? else {
        // The conflicting row vanished between insert and lookup.
        return Err(conflict());
    };
    if !sd.is_deleted(&existing) {
        tracing::warn!(entity = %entity.name, fields = ?fields, "create conflicts with a live row");
        return Err(conflict());
    }

    let pk = existing.get(&entity.pk).cloned().unwrap_or_default();
    repo.restore(entity, &pk).await?;
    let mut merge = attrs;
    merge.remove(&entity.pk);
    repo.update(entity, &pk, &merge).await?;
    tracing::warn!(entity = %entity.name, pk = %pk, "restored soft-deleted row on create");
    repo.find_by_pk(entity, &pk)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, pk)))
}

/// Equality on every conflicting field; `None` when the attributes do not pin all of them.
fn conflict_predicate(fields: &[String], attrs: &Row) -> Option<Predicate> {
    if fields.is_empty() {
        return None;
    }
    fields
        .iter()
        .map(|f| {
            attrs
                .get(f)
                .filter(|v| !v.is_null())
                .map(|v| Predicate::eq(f.clone(), v.clone()))
        })
        .try_fold(Predicate::all(), |acc, p| p.map(|p| acc.and(p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnInfo, PkType, SoftDelete};
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            pk_type: (name == "id").then_some(PkType::Int),
            nullable: name != "id",
            default: None,
            has_default: name == "id",
            unique: name == "email",
            pg_type: if name == "id" { "serial".into() } else { "text".into() },
        }
    }

    fn user(soft: bool) -> ResolvedEntity {
        ResolvedEntity {
            name: "user".into(),
            schema_name: "public".into(),
            table_name: "user".into(),
            path_segment: Some("users".into()),
            namespace: None,
            pk: "id".into(),
            pk_type: PkType::Int,
            columns: vec![column("id"), column("email"), column("name"), column("deleted_at")],
            unique: vec![vec!["email".into()]],
            soft_delete: soft.then(|| SoftDelete {
                column: "deleted_at".into(),
                sentinel: Value::Null,
            }),
            relationships: Vec::new(),
        }
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn revives_soft_deleted_row_with_same_identity() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store);
        let user = user(true);
        let first = create_or_restore(&repo, &user, row(json!({"email": "a@x", "name": "A"})))
            .await
            .unwrap();
        repo.destroy(&user, Repository::by_pk(&user, &first["id"])).await.unwrap();

        let again = create_or_restore(&repo, &user, row(json!({"email": "a@x", "name": "B"})))
            .await
            .unwrap();
        assert_eq!(again["id"], first["id"]);
        assert_eq!(again["name"], "B");
        assert_eq!(again["deleted_at"], Value::Null);
    }

    #[tokio::test]
    async fn live_conflict_is_reported_and_row_untouched() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store);
        let user = user(true);
        let first = create_or_restore(&repo, &user, row(json!({"email": "a@x", "name": "A"})))
            .await
            .unwrap();
        let err = create_or_restore(&repo, &user, row(json!({"email": "a@x", "name": "B"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let kept = repo.find_by_pk(&user, &first["id"]).await.unwrap().unwrap();
        assert_eq!(kept["name"], "A");
    }

    #[tokio::test]
    async fn without_soft_delete_conflicts_are_final() {
        let store = MemoryStore::new();
        let repo = Repository::new(&store);
        let user = user(false);
        create_or_restore(&repo, &user, row(json!({"email": "a@x"}))).await.unwrap();
        let err = create_or_restore(&repo, &user, row(json!({"email": "a@x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn conflict_predicate_needs_every_field() {
        let attrs = row(json!({"first": "Jon", "last": null}));
        assert!(conflict_predicate(&["first".into(), "last".into()], &attrs).is_none());
        assert_eq!(
            conflict_predicate(&["first".into()], &attrs),
            Some(Predicate::eq("first", json!("Jon")))
        );
    }
}

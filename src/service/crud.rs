//! CRUD engine: runs one verb against a resource, a relationship collection or a relationship item.

use super::include;
use super::recovery::create_or_restore;
use super::Repository;
use crate::config::{Association, ResolvedEntity, ResolvedModel, ResolvedRelationship};
use crate::error::AppError;
use crate::query::{Direction, OrderBy, Predicate, QueryDescriptor};
use crate::resolver::{self, AccessorKind, Resolution};
use crate::routes::Verb;
use crate::store::{Row, Selection, Store};
use futures::future::try_join_all;
use serde_json::Value;

/// Request body: a single object or an array of objects. Responses mirror the shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    One(Row),
    Many(Vec<Row>),
}

impl Payload {
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Object(row) => Ok(Payload::One(row)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    _ => Err(AppError::BadRequest("array elements must be JSON objects".into())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Payload::Many),
            _ => Err(AppError::BadRequest("body must be a JSON object or array".into())),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Payload::One(row) => Value::Object(row),
            Payload::Many(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
        }
    }

    fn into_rows(self) -> (bool, Vec<Row>) {
        match self {
            Payload::One(row) => (false, vec![row]),
            Payload::Many(rows) => (true, rows),
        }
    }

    fn from_rows(many: bool, rows: Vec<Row>) -> Self {
        if many {
            Payload::Many(rows)
        } else {
            Payload::One(rows.into_iter().next().unwrap_or_default())
        }
    }
}

/// One routed request, ids already parsed to the key type of their entity.
#[derive(Debug)]
pub struct Request<'a> {
    pub entity: &'a ResolvedEntity,
    pub id: Option<Value>,
    pub relationship: Option<&'a str>,
    pub child_id: Option<Value>,
    pub query: QueryDescriptor,
    pub body: Option<Payload>,
}

/// Terminal state of a request, before shaping into an HTTP response.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Found(Row),
    /// A bounded collection read; `total` ignores limit and offset.
    Page { rows: Vec<Row>, offset: u64, total: u64 },
    Created(Payload),
    Updated(Payload),
    Deleted,
}

/// Join rows of a many-to-many read, attached to each member under the join entity's name.
struct Membership<'m> {
    join: &'m ResolvedEntity,
    target_key: &'m str,
    links: Vec<Row>,
}

impl Membership<'_> {
    fn attach(&self, target: &ResolvedEntity, rows: &mut [Row]) {
        for row in rows {
            let member = row.get(&target.pk).and_then(include::key);
            let link = self
                .links
                .iter()
                .find(|l| member.is_some() && l.get(self.target_key).and_then(include::key) == member);
            if let Some(link) = link {
                row.insert(self.join.name.clone(), Value::Object(link.clone()));
            }
        }
    }
}

fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn not_found(entity: &ResolvedEntity, id: &Value) -> AppError {
    AppError::NotFound(format!("{} {}", entity.name, display_id(id)))
}

fn require_body(body: Option<Payload>) -> Result<Payload, AppError> {
    body.ok_or_else(|| AppError::BadRequest("request body required".into()))
}

fn require_object(body: Option<Payload>) -> Result<Row, AppError> {
    match require_body(body)? {
        Payload::One(row) => Ok(row),
        Payload::Many(_) => Err(AppError::BadRequest("expected a single JSON object".into())),
    }
}

/// Attributes addressed to the join row travel in the body under the join entity's name.
fn take_join_attrs(attrs: &mut Row, join: &ResolvedEntity) -> Row {
    match attrs.remove(&join.name) {
        Some(Value::Object(row)) => row,
        _ => Row::new(),
    }
}

fn pk_of(entity: &ResolvedEntity, row: &Row) -> Value {
    row.get(&entity.pk).cloned().unwrap_or_default()
}

fn join_of<'m>(res: &Resolution<'m>) -> Result<&'m ResolvedEntity, AppError> {
    res.through
        .ok_or_else(|| AppError::NotFound(format!("join resource of {}", res.relationship.alias)))
}

fn unsupported(verb: Verb, what: &str) -> AppError {
    AppError::BadRequest(format!("{} is not supported on {}", verb.as_str(), what))
}

#[derive(Clone, Copy)]
pub struct CrudService<'a> {
    model: &'a ResolvedModel,
    repo: Repository<'a>,
}

impl<'a> CrudService<'a> {
    pub fn new(model: &'a ResolvedModel, store: &'a dyn Store) -> Self {
        CrudService {
            model,
            repo: Repository::new(store),
        }
    }

    pub fn repository(&self) -> Repository<'a> {
        self.repo
    }

    pub async fn execute(&self, verb: Verb, request: Request<'a>) -> Result<Outcome, AppError> {
        let Request {
            entity,
            id,
            relationship,
            child_id,
            query,
            body,
        } = request;
        tracing::debug!(entity = %entity.name, verb = verb.as_str(), relationship = ?relationship, "execute");
        match (relationship, verb, id) {
            (None, Verb::Get, None) => self.list(entity, query).await,
            (None, Verb::Get, Some(id)) => self.read(entity, &id, query).await,
            (None, Verb::Post, None) => self.create(entity, require_body(body)?).await,
            (None, Verb::Put, Some(id)) => self.update(entity, &id, require_object(body)?).await,
            (None, Verb::Del, Some(id)) => self.destroy(entity, &id).await,
            (Some(alias), verb, Some(id)) => {
                self.related(entity, &id, alias, verb, child_id, query, body)
                    .await
            }
            (_, verb, _) => Err(unsupported(verb, &entity.name)),
        }
    }

    async fn list(&self, entity: &'a ResolvedEntity, query: QueryDescriptor) -> Result<Outcome, AppError> {
        let (rows, total) = self.select_page(entity, Predicate::all(), &query, None).await?;
        Ok(Outcome::Page {
            rows,
            offset: query.offset,
            total,
        })
    }

    async fn read(&self, entity: &'a ResolvedEntity, id: &Value, query: QueryDescriptor) -> Result<Outcome, AppError> {
        self.select_one(entity, Repository::by_pk(entity, id), &query, None)
            .await?
            .map(Outcome::Found)
            .ok_or_else(|| not_found(entity, id))
    }

    async fn create(&self, entity: &'a ResolvedEntity, body: Payload) -> Result<Outcome, AppError> {
        let (many, items) = body.into_rows();
        let created = try_join_all(items.into_iter().map(|mut attrs| {
            attrs.remove(&entity.pk);
            create_or_restore(&self.repo, entity, attrs)
        }))
        .await?;
        Ok(Outcome::Created(Payload::from_rows(many, created)))
    }

    async fn update(&self, entity: &'a ResolvedEntity, id: &Value, mut attrs: Row) -> Result<Outcome, AppError> {
        self.repo
            .find_by_pk(entity, id)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        attrs.remove(&entity.pk);
        let row = self
            .repo
            .update(entity, id, &attrs)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        Ok(Outcome::Updated(Payload::One(row)))
    }

    async fn destroy(&self, entity: &'a ResolvedEntity, id: &Value) -> Result<Outcome, AppError> {
        self.repo
            .find_by_pk(entity, id)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        self.repo.destroy(entity, Repository::by_pk(entity, id)).await?;
        Ok(Outcome::Deleted)
    }

    /// Page of rows matching `base` and the query, with includes and join rows attached.
    async fn select_page(
        &self,
        entity: &'a ResolvedEntity,
        base: Predicate,
        query: &QueryDescriptor,
        membership: Option<&Membership<'a>>,
    ) -> Result<(Vec<Row>, u64), AppError> {
        let grouped = query.group.as_ref().is_some_and(|g| !g.is_empty());
        if grouped && !query.include.is_empty() {
            return Err(AppError::InvalidQuery("_include cannot be combined with _group".into()));
        }
        let required = include::restrict(self.repo, self.model, entity, &query.include).await?;
        let mut order = query.order.clone();
        if !grouped && !order.iter().any(|o| o.field == entity.pk) {
            order.push(OrderBy {
                field: entity.pk.clone(),
                direction: Direction::Asc,
            });
        }
        let mut needed = include::key_columns(entity, &query.include);
        if membership.is_some() {
            needed.push(entity.pk.clone());
        }
        let (attributes, extra) = include::widen(query.attributes.as_ref(), &needed);
        let selection = Selection {
            predicate: base.and(query.where_.clone()).and(required),
            attributes,
            order,
            limit: Some(query.limit),
            offset: query.offset,
            group: query.group.clone(),
            having: query.having.clone(),
        };
        let (mut rows, total) = self.repo.find_and_count(entity, &selection).await?;
        include::load(self.repo, self.model, entity, &mut rows, &query.include).await?;
        if let Some(m) = membership {
            m.attach(entity, &mut rows);
        }
        include::strip(&mut rows, &extra);
        Ok((rows, total))
    }

    async fn select_one(
        &self,
        entity: &'a ResolvedEntity,
        predicate: Predicate,
        query: &QueryDescriptor,
        membership: Option<&Membership<'a>>,
    ) -> Result<Option<Row>, AppError> {
        let required = include::restrict(self.repo, self.model, entity, &query.include).await?;
        let mut needed = include::key_columns(entity, &query.include);
        if membership.is_some() {
            needed.push(entity.pk.clone());
        }
        let (attributes, extra) = include::widen(query.attributes.as_ref(), &needed);
        let selection = Selection {
            predicate: predicate.and(required),
            attributes,
            limit: Some(1),
            ..Default::default()
        };
        let mut rows = self.repo.find_many(entity, &selection).await?;
        include::load(self.repo, self.model, entity, &mut rows, &query.include).await?;
        if let Some(m) = membership {
            m.attach(entity, &mut rows);
        }
        include::strip(&mut rows, &extra);
        Ok(rows.into_iter().next())
    }

    #[allow(clippy::too_many_arguments)]
    async fn related(
        &self,
        entity: &'a ResolvedEntity,
        id: &Value,
        alias: &str,
        verb: Verb,
        child_id: Option<Value>,
        query: QueryDescriptor,
        body: Option<Payload>,
    ) -> Result<Outcome, AppError> {
        let res = resolver::resolve(self.model, entity, alias, verb, child_id.is_some())?;
        let owner = self
            .repo
            .find_by_pk(entity, id)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        let owner_pk = pk_of(entity, &owner);

        match (res.accessor, child_id) {
            (AccessorKind::SingleGet, _) => self.single_get(&owner, &res, &query).await,
            (AccessorKind::SingleSet, _) if verb == Verb::Put => {
                self.single_put(entity, &owner, &res, require_object(body)?).await
            }
            (AccessorKind::SingleSet, _) => self.single_clear(entity, &owner, &res).await,
            (AccessorKind::PluralGet, None) => {
                let (base, membership) = self.members(&owner_pk, &res, query.through.as_ref()).await?;
                let (rows, total) = self
                    .select_page(res.target, base, &query, membership.as_ref())
                    .await?;
                Ok(Outcome::Page {
                    rows,
                    offset: query.offset,
                    total,
                })
            }
            (AccessorKind::PluralGet, Some(child)) => {
                let (base, membership) = self.members(&owner_pk, &res, query.through.as_ref()).await?;
                let predicate = base.and(Repository::by_pk(res.target, &child));
                self.select_one(res.target, predicate, &query, membership.as_ref())
                    .await?
                    .map(Outcome::Found)
                    .ok_or_else(|| not_found(res.target, &child))
            }
            (AccessorKind::PluralAdd, _) => {
                let (many, items) = require_body(body)?.into_rows();
                let created = try_join_all(items.into_iter().map(|attrs| self.add_member(&owner_pk, &res, attrs))).await?;
                Ok(Outcome::Created(Payload::from_rows(many, created)))
            }
            (AccessorKind::PluralSetItem, Some(child)) => {
                let (row, created) = self
                    .set_member(&owner_pk, &res, &child, require_object(body)?)
                    .await?;
                Ok(if created {
                    Outcome::Created(Payload::One(row))
                } else {
                    Outcome::Updated(Payload::One(row))
                })
            }
            (AccessorKind::PluralRemoveItem, Some(child)) => self.remove_member(&owner_pk, &res, &child).await,
            (AccessorKind::PluralBulk, _) if verb == Verb::Put => {
                self.bulk_put(&owner_pk, &res, require_body(body)?).await
            }
            (AccessorKind::PluralBulk, _) => self.bulk_delete(&owner_pk, &res, &query).await,
            (_, _) => Err(unsupported(verb, alias)),
        }
    }

    /// Predicate selecting the owner's related rows on the target; many-to-many also returns the join rows.
    async fn members(
        &self,
        owner_pk: &Value,
        res: &Resolution<'a>,
        through_filter: Option<&Predicate>,
    ) -> Result<(Predicate, Option<Membership<'a>>), AppError> {
        let rel: &'a ResolvedRelationship = res.relationship;
        match &rel.association {
            Association::HasOne { foreign_key } | Association::HasMany { foreign_key } => {
                Ok((Predicate::eq(foreign_key.clone(), owner_pk.clone()), None))
            }
            Association::BelongsTo { .. } => Err(AppError::BadRequest(format!(
                "{} is a singular relationship",
                rel.alias
            ))),
            Association::ManyToMany {
                owner_key, target_key, ..
            } => {
                let join = join_of(res)?;
                let selection = Selection {
                    predicate: Predicate::eq(owner_key.clone(), owner_pk.clone())
                        .and(through_filter.cloned().unwrap_or_default()),
                    order: vec![OrderBy {
                        field: join.pk.clone(),
                        direction: Direction::Asc,
                    }],
                    ..Default::default()
                };
                let links = self.repo.find_many(join, &selection).await?;
                let ids = include::distinct(&links, target_key);
                let membership = Membership {
                    join,
                    target_key,
                    links,
                };
                Ok((Predicate::in_list(res.target.pk.clone(), ids), Some(membership)))
            }
        }
    }

    /// The related row of a singular relationship, if any.
    async fn single_related(&self, owner: &Row, res: &Resolution<'a>) -> Result<Option<Row>, AppError> {
        let predicate = match &res.relationship.association {
            Association::HasOne { foreign_key } => {
                let owner_entity = self
                    .model
                    .entity(&res.relationship.owner)
                    .ok_or_else(|| AppError::NotFound(res.relationship.owner.clone()))?;
                Predicate::eq(foreign_key.clone(), pk_of(owner_entity, owner))
            }
            Association::BelongsTo { foreign_key } => match owner.get(foreign_key) {
                Some(v) if !v.is_null() => Repository::by_pk(res.target, v),
                _ => return Ok(None),
            },
            _ => return Err(AppError::BadRequest(format!("{} is a plural relationship", res.relationship.alias))),
        };
        Ok(self.repo.find_one(res.target, predicate).await?)
    }

    async fn single_get(&self, owner: &Row, res: &Resolution<'a>, query: &QueryDescriptor) -> Result<Outcome, AppError> {
        let related = self.single_related(owner, res).await?;
        let Some(related) = related else {
            return Err(AppError::NotFound(format!("{} of owner", res.relationship.alias)));
        };
        let pk = pk_of(res.target, &related);
        self.select_one(res.target, Repository::by_pk(res.target, &pk), query, None)
            .await?
            .map(Outcome::Found)
            .ok_or_else(|| not_found(res.target, &pk))
    }

    /// Upsert the one related row: update in place when present, otherwise create and attach.
    async fn single_put(
        &self,
        owner_entity: &'a ResolvedEntity,
        owner: &Row,
        res: &Resolution<'a>,
        mut attrs: Row,
    ) -> Result<Outcome, AppError> {
        let target = res.target;
        attrs.remove(&target.pk);
        let owner_pk = pk_of(owner_entity, owner);
        if let Association::HasOne { foreign_key } = &res.relationship.association {
            attrs.insert(foreign_key.clone(), owner_pk.clone());
        }
        if let Some(existing) = self.single_related(owner, res).await? {
            let pk = pk_of(target, &existing);
            let row = self
                .repo
                .update(target, &pk, &attrs)
                .await?
                .ok_or_else(|| not_found(target, &pk))?;
            return Ok(Outcome::Updated(Payload::One(row)));
        }
        let row = create_or_restore(&self.repo, target, attrs).await?;
        if let Association::BelongsTo { foreign_key } = &res.relationship.association {
            let mut link = Row::new();
            link.insert(foreign_key.clone(), pk_of(target, &row));
            self.repo.update(owner_entity, &owner_pk, &link).await?;
        }
        Ok(Outcome::Created(Payload::One(row)))
    }

    /// Remove the one related row. Absent is not an error here.
    async fn single_clear(&self, owner_entity: &'a ResolvedEntity, owner: &Row, res: &Resolution<'a>) -> Result<Outcome, AppError> {
        match &res.relationship.association {
            Association::HasOne { .. } => {
                if let Some(existing) = self.single_related(owner, res).await? {
                    let pk = pk_of(res.target, &existing);
                    self.repo.destroy(res.target, Repository::by_pk(res.target, &pk)).await?;
                }
            }
            Association::BelongsTo { foreign_key } => {
                let fk = owner.get(foreign_key).cloned().unwrap_or(Value::Null);
                if !fk.is_null() {
                    let mut link = Row::new();
                    link.insert(foreign_key.clone(), Value::Null);
                    self.repo.update(owner_entity, &pk_of(owner_entity, owner), &link).await?;
                    self.repo.destroy(res.target, Repository::by_pk(res.target, &fk)).await?;
                }
            }
            _ => return Err(AppError::BadRequest(format!("{} is a plural relationship", res.relationship.alias))),
        }
        Ok(Outcome::Deleted)
    }

    /// Find or create the join row between owner and target; `attrs` update an existing one.
    async fn link(
        &self,
        res: &Resolution<'a>,
        owner_pk: &Value,
        target_pk: &Value,
        mut attrs: Row,
    ) -> Result<Row, AppError> {
        let join = join_of(res)?;
        let Association::ManyToMany {
            owner_key, target_key, ..
        } = &res.relationship.association
        else {
            return Err(AppError::BadRequest(format!("{} has no join resource", res.relationship.alias)));
        };
        let predicate = Predicate::eq(owner_key.clone(), owner_pk.clone())
            .and(Predicate::eq(target_key.clone(), target_pk.clone()));
        attrs.remove(&join.pk);
        attrs.remove(owner_key);
        attrs.remove(target_key);
        if let Some(existing) = self.repo.find_one(join, predicate).await? {
            let pk = pk_of(join, &existing);
            return self
                .repo
                .update(join, &pk, &attrs)
                .await?
                .ok_or_else(|| not_found(join, &pk));
        }
        attrs.insert(owner_key.clone(), owner_pk.clone());
        attrs.insert(target_key.clone(), target_pk.clone());
        create_or_restore(&self.repo, join, attrs).await
    }

    /// Create a new member under the owner. The client may not choose its key.
    async fn add_member(&self, owner_pk: &Value, res: &Resolution<'a>, mut attrs: Row) -> Result<Row, AppError> {
        let target = res.target;
        attrs.remove(&target.pk);
        match &res.relationship.association {
            Association::HasMany { foreign_key } | Association::HasOne { foreign_key } => {
                attrs.insert(foreign_key.clone(), owner_pk.clone());
                create_or_restore(&self.repo, target, attrs).await
            }
            Association::ManyToMany { .. } => {
                let join = join_of(res)?;
                let join_attrs = take_join_attrs(&mut attrs, join);
                let mut member = create_or_restore(&self.repo, target, attrs).await?;
                let link = self.link(res, owner_pk, &pk_of(target, &member), join_attrs).await?;
                member.insert(join.name.clone(), Value::Object(link));
                Ok(member)
            }
            Association::BelongsTo { .. } => Err(unsupported(Verb::Post, &res.relationship.alias)),
        }
    }

    /// Upsert the member with key `child`; returns the row and whether it was created.
    async fn set_member(
        &self,
        owner_pk: &Value,
        res: &Resolution<'a>,
        child: &Value,
        mut attrs: Row,
    ) -> Result<(Row, bool), AppError> {
        let target = res.target;
        attrs.remove(&target.pk);
        let join_attrs = match res.through {
            Some(join) => Some(take_join_attrs(&mut attrs, join)),
            None => None,
        };
        if let Association::HasMany { foreign_key } | Association::HasOne { foreign_key } = &res.relationship.association {
            attrs.insert(foreign_key.clone(), owner_pk.clone());
        }

        let (mut member, created) = match self.repo.find_by_pk(target, child).await? {
            Some(_) => {
                let row = self
                    .repo
                    .update(target, child, &attrs)
                    .await?
                    .ok_or_else(|| not_found(target, child))?;
                (row, false)
            }
            None => {
                attrs.insert(target.pk.clone(), child.clone());
                (create_or_restore(&self.repo, target, attrs).await?, true)
            }
        };
        if let (Some(join), Some(join_attrs)) = (res.through, join_attrs) {
            let link = self.link(res, owner_pk, &pk_of(target, &member), join_attrs).await?;
            member.insert(join.name.clone(), Value::Object(link));
        }
        Ok((member, created))
    }

    async fn remove_member(&self, owner_pk: &Value, res: &Resolution<'a>, child: &Value) -> Result<Outcome, AppError> {
        let removed = match &res.relationship.association {
            Association::HasMany { foreign_key } | Association::HasOne { foreign_key } => {
                let predicate = Repository::by_pk(res.target, child)
                    .and(Predicate::eq(foreign_key.clone(), owner_pk.clone()));
                self.repo.destroy(res.target, predicate).await?
            }
            Association::ManyToMany {
                owner_key, target_key, ..
            } => {
                let predicate = Predicate::eq(owner_key.clone(), owner_pk.clone())
                    .and(Predicate::eq(target_key.clone(), child.clone()));
                self.repo.destroy(join_of(res)?, predicate).await?
            }
            Association::BelongsTo { .. } => return Err(unsupported(Verb::Del, &res.relationship.alias)),
        };
        if removed == 0 {
            return Err(not_found(res.target, child));
        }
        Ok(Outcome::Deleted)
    }

    /// Create-or-update each element against the owner's members, matched by its own key.
    async fn bulk_put(&self, owner_pk: &Value, res: &Resolution<'a>, body: Payload) -> Result<Outcome, AppError> {
        let target = res.target;
        let (many, items) = body.into_rows();
        let results = try_join_all(items.into_iter().map(|attrs| async move {
            match attrs.get(&target.pk).filter(|v| !v.is_null()).cloned() {
                Some(child) => self.set_member(owner_pk, res, &child, attrs).await,
                None => Ok((self.add_member(owner_pk, res, attrs).await?, true)),
            }
        }))
        .await?;
        let all_created = results.iter().all(|(_, created)| *created);
        let rows = Payload::from_rows(many, results.into_iter().map(|(row, _)| row).collect());
        Ok(if all_created {
            Outcome::Created(rows)
        } else {
            Outcome::Updated(rows)
        })
    }

    /// Remove every member matching the query filters; many-to-many members are detached.
    async fn bulk_delete(&self, owner_pk: &Value, res: &Resolution<'a>, query: &QueryDescriptor) -> Result<Outcome, AppError> {
        let removed = match &res.relationship.association {
            Association::HasMany { foreign_key } | Association::HasOne { foreign_key } => {
                let predicate = Predicate::eq(foreign_key.clone(), owner_pk.clone()).and(query.where_.clone());
                self.repo.destroy(res.target, predicate).await?
            }
            Association::ManyToMany {
                owner_key, target_key, ..
            } => {
                let mut predicate = Predicate::eq(owner_key.clone(), owner_pk.clone())
                    .and(query.through.clone().unwrap_or_default());
                if !query.where_.is_all() {
                    let selection = Selection {
                        predicate: query.where_.clone(),
                        attributes: Some(vec![res.target.pk.clone()]),
                        ..Default::default()
                    };
                    let matching = self.repo.find_many(res.target, &selection).await?;
                    predicate = predicate.and(Predicate::in_list(
                        target_key.clone(),
                        include::distinct(&matching, &res.target.pk),
                    ));
                }
                self.repo.destroy(join_of(res)?, predicate).await?
            }
            Association::BelongsTo { .. } => return Err(unsupported(Verb::Del, &res.relationship.alias)),
        };
        if removed == 0 {
            return Err(AppError::NotFound(format!("no {} matched", res.relationship.alias)));
        }
        Ok(Outcome::Deleted)
    }
}

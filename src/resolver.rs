//! Association resolver: maps (resource, alias, verb, child id present) to the accessor the engine runs.

use crate::config::{AddressMode, ResolvedEntity, ResolvedModel, ResolvedRelationship};
use crate::error::AppError;
use crate::routes::Verb;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    SingleGet,
    /// PUT replaces or creates the related row; DEL clears the association.
    SingleSet,
    PluralGet,
    PluralAdd,
    PluralSetItem,
    PluralRemoveItem,
    /// PUT or DEL on the whole related collection.
    PluralBulk,
}

#[derive(Clone, Copy, Debug)]
pub struct Resolution<'m> {
    pub relationship: &'m ResolvedRelationship,
    pub target: &'m ResolvedEntity,
    /// Join entity, many-to-many only.
    pub through: Option<&'m ResolvedEntity>,
    pub accessor: AccessorKind,
}

pub fn accessor_for(mode: AddressMode, verb: Verb, has_child_id: bool) -> Option<AccessorKind> {
    use AccessorKind::*;
    Some(match (mode, verb, has_child_id) {
        (AddressMode::Singular, _, true) => return None,
        (AddressMode::Singular, Verb::Get, false) => SingleGet,
        (AddressMode::Singular, Verb::Put | Verb::Del, false) => SingleSet,
        (AddressMode::Singular, Verb::Post, false) => return None,
        (AddressMode::Plural, Verb::Get, _) => PluralGet,
        (AddressMode::Plural, Verb::Post, false) => PluralAdd,
        (AddressMode::Plural, Verb::Post, true) => return None,
        (AddressMode::Plural, Verb::Put, true) => PluralSetItem,
        (AddressMode::Plural, Verb::Del, true) => PluralRemoveItem,
        (AddressMode::Plural, Verb::Put | Verb::Del, false) => PluralBulk,
    })
}

pub fn resolve<'m>(
    model: &'m ResolvedModel,
    entity: &'m ResolvedEntity,
    alias: &str,
    verb: Verb,
    has_child_id: bool,
) -> Result<Resolution<'m>, AppError> {
    let relationship = entity
        .relationship(alias)
        .ok_or_else(|| AppError::NotFound(format!("{} has no relationship '{}'", entity.name, alias)))?;
    let target = model
        .target_of(relationship)
        .ok_or_else(|| AppError::NotFound(format!("relationship target {}", relationship.target)))?;
    let through = match relationship.through() {
        Some(name) => Some(
            model
                .entity(name)
                .ok_or_else(|| AppError::NotFound(format!("join resource {}", name)))?,
        ),
        None => None,
    };
    let accessor = accessor_for(relationship.address_mode(), verb, has_child_id).ok_or_else(|| {
        AppError::BadRequest(format!(
            "{} is not supported on {}/{}",
            verb.as_str(),
            entity.name,
            alias
        ))
    })?;
    Ok(Resolution {
        relationship,
        target,
        through,
        accessor,
    })
}

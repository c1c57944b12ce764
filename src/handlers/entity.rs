//! Entity handler: turns one matched route rule plus the raw request into an engine call.

use crate::config::PkType;
use crate::error::AppError;
use crate::query::compile;
use crate::response;
use crate::routes::{RouteRule, Verb};
use crate::service::{CrudService, Payload, Request};
use crate::state::AppState;
use axum::body::Bytes;
use axum::response::Response;
use serde_json::Value;
use std::collections::HashMap;

pub fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest(format!("invalid uuid: {}", id_str)))?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid id: {}", id_str)))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

/// POST and PUT take a JSON object or array; GET and DEL ignore the body.
fn parse_body(verb: Verb, body: &Bytes) -> Result<Option<Payload>, AppError> {
    if matches!(verb, Verb::Get | Verb::Del) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
    Payload::from_json(value).map(Some)
}

pub async fn dispatch(
    state: AppState,
    rule: &RouteRule,
    params: HashMap<String, String>,
    pairs: Vec<(String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let model = state.model.as_ref();
    let entity = model
        .entity(&rule.entity)
        .ok_or_else(|| AppError::NotFound(rule.entity.clone()))?;
    let relationship = match rule.relationship.as_deref() {
        Some(alias) => Some(
            entity
                .relationship(alias)
                .ok_or_else(|| AppError::NotFound(format!("{}/{}", entity.name, alias)))?,
        ),
        None => None,
    };
    let target = match relationship {
        Some(rel) => model
            .target_of(rel)
            .ok_or_else(|| AppError::NotFound(rel.target.clone()))?,
        None => entity,
    };

    let id = params.get("id").map(|s| parse_id(s, &entity.pk_type)).transpose()?;
    let child_id = params
        .get("child_id")
        .map(|s| parse_id(s, &target.pk_type))
        .transpose()?;
    let query = compile(&pairs, target)?;
    let body = parse_body(rule.verb, &body)?;

    tracing::debug!(verb = rule.verb.as_str(), pattern = %rule.pattern, "dispatch");
    let request = Request {
        entity,
        id,
        relationship: relationship.map(|r| r.alias.as_str()),
        child_id,
        query,
        body,
    };
    let outcome = CrudService::new(model, state.store.as_ref())
        .execute(rule.verb, request)
        .await?;
    Ok(response::shape(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_by_key_type() {
        assert_eq!(parse_id("42", &PkType::Int).unwrap(), Value::from(42));
        assert!(matches!(parse_id("x", &PkType::BigInt), Err(AppError::BadRequest(_))));
        assert!(parse_id("not-a-uuid", &PkType::Uuid).is_err());
        assert_eq!(parse_id("stark", &PkType::Text).unwrap(), Value::from("stark"));
    }

    #[test]
    fn body_is_ignored_for_reads_and_deletes() {
        let body = Bytes::from_static(b"{\"a\":1}");
        assert_eq!(parse_body(Verb::Get, &body).unwrap(), None);
        assert_eq!(parse_body(Verb::Del, &body).unwrap(), None);
        assert!(matches!(parse_body(Verb::Post, &body).unwrap(), Some(Payload::One(_))));
        assert_eq!(parse_body(Verb::Put, &Bytes::new()).unwrap(), None);
        assert!(parse_body(Verb::Post, &Bytes::from_static(b"{oops")).is_err());
    }
}

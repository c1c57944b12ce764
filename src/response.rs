//! Response shaping: status codes and the `X-Range` header for bounded collection reads.

use crate::service::Outcome;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

pub const X_RANGE: &str = "x-range";

/// Position of one page within the full result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub offset: u64,
    pub row_count: u64,
    pub total: u64,
}

impl Range {
    pub fn new(offset: u64, row_count: u64, total: u64) -> Self {
        Range {
            offset,
            row_count,
            total,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.row_count
    }

    /// `objects {offset}-{offset+rowCount}/{total}`
    pub fn header_value(&self) -> String {
        format!("objects {}-{}/{}", self.offset, self.end(), self.total)
    }

    /// 206 while rows remain beyond this page.
    pub fn status(&self) -> StatusCode {
        if self.end() >= self.total {
            StatusCode::OK
        } else {
            StatusCode::PARTIAL_CONTENT
        }
    }
}

fn json(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

pub fn shape(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Found(row) => json(StatusCode::OK, Value::Object(row)),
        Outcome::Page { rows, offset, total } => {
            let range = Range::new(offset, rows.len() as u64, total);
            let body = Value::Array(rows.into_iter().map(Value::Object).collect());
            let mut response = json(range.status(), body);
            if let Ok(value) = HeaderValue::from_str(&range.header_value()) {
                response.headers_mut().insert(X_RANGE, value);
            }
            response
        }
        Outcome::Created(payload) => json(StatusCode::CREATED, payload.into_json()),
        Outcome::Updated(payload) => json(StatusCode::OK, payload.into_json()),
        Outcome::Deleted => StatusCode::NO_CONTENT.into_response(),
    }
}

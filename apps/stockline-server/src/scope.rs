//! Caller scope resolved from request headers.
//!
//! ```text
//! x-tenant-id:        t1           required
//! x-organisation-id:  o1           required
//! x-branch-id:        b7           required for branch roles
//! x-role:             branch_user  → LedgerKind::Branch
//! ```
//!
//! The headers stand in for an auth layer that would resolve the same four
//! values from a session.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::ApiError;
use stockline_core::{LedgerKind, Scope, ValidationError};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ORGANISATION_HEADER: &str = "x-organisation-id";
pub const BRANCH_HEADER: &str = "x-branch-id";
pub const ROLE_HEADER: &str = "x-role";

/// The tenancy scope and ledger of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerScope {
    pub scope: Scope,
    pub kind: LedgerKind,
}

impl<S: Send + Sync> FromRequestParts<S> for CallerScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(resolve(&parts.headers)?)
    }
}

/// Reads the scope headers. Blank values count as missing.
pub fn resolve(headers: &HeaderMap) -> Result<CallerScope, ValidationError> {
    let tenant_id = header(headers, TENANT_HEADER)?.ok_or_else(|| ValidationError::required(TENANT_HEADER))?;
    let organisation_id =
        header(headers, ORGANISATION_HEADER)?.ok_or_else(|| ValidationError::required(ORGANISATION_HEADER))?;
    let branch_id = header(headers, BRANCH_HEADER)?;
    let kind = header(headers, ROLE_HEADER)?
        .ok_or_else(|| ValidationError::required(ROLE_HEADER))?
        .parse::<LedgerKind>()?;

    Ok(CallerScope {
        scope: Scope {
            tenant_id,
            organisation_id,
            branch_id,
        },
        kind,
    })
}

fn header(headers: &HeaderMap, name: &str) -> Result<Option<String>, ValidationError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ValidationError::invalid(name, "not valid ASCII"))?
        .trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_branch_user() {
        let caller = resolve(&headers(&[
            (TENANT_HEADER, "t1"),
            (ORGANISATION_HEADER, "o1"),
            (BRANCH_HEADER, "b7"),
            (ROLE_HEADER, "branch_user"),
        ]))
        .unwrap();
        assert_eq!(caller.kind, LedgerKind::Branch);
        assert_eq!(caller.scope, Scope::organisation("t1", "o1").with_branch("b7"));
    }

    #[test]
    fn test_blank_branch_is_none() {
        let caller = resolve(&headers(&[
            (TENANT_HEADER, "t1"),
            (ORGANISATION_HEADER, "o1"),
            (BRANCH_HEADER, "  "),
            (ROLE_HEADER, "org_admin"),
        ]))
        .unwrap();
        assert_eq!(caller.kind, LedgerKind::Organisation);
        assert_eq!(caller.scope.branch_id, None);
    }

    #[test]
    fn test_missing_and_unknown() {
        assert!(matches!(
            resolve(&headers(&[(ORGANISATION_HEADER, "o1"), (ROLE_HEADER, "org")])),
            Err(ValidationError::Required { .. })
        ));
        assert!(resolve(&headers(&[
            (TENANT_HEADER, "t1"),
            (ORGANISATION_HEADER, "o1"),
            (ROLE_HEADER, "cashier"),
        ]))
        .is_err());
    }
}

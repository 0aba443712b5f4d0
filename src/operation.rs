//! The five operations a resource can expose.

use crate::error::ServiceError;
use axum::routing::MethodFilter;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GetMany,
    GetOne,
    Post,
    Patch,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::GetMany,
        Operation::GetOne,
        Operation::Post,
        Operation::Patch,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetMany => "get_many",
            Operation::GetOne => "get_one",
            Operation::Post => "post",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
        }
    }

    pub fn http_method(self) -> &'static str {
        match self {
            Operation::GetMany | Operation::GetOne => "GET",
            Operation::Post => "POST",
            Operation::Patch => "PATCH",
            Operation::Delete => "DELETE",
        }
    }

    pub fn method_filter(self) -> MethodFilter {
        match self {
            Operation::GetMany | Operation::GetOne => MethodFilter::GET,
            Operation::Post => MethodFilter::POST,
            Operation::Patch => MethodFilter::PATCH,
            Operation::Delete => MethodFilter::DELETE,
        }
    }

    /// Whether the route addresses a single record by `{id}`.
    pub fn addresses_one(self) -> bool {
        matches!(self, Operation::GetOne | Operation::Patch | Operation::Delete)
    }

    /// Error kind reported when this operation could not complete.
    pub fn failure_kind(self) -> ServiceError {
        match self {
            Operation::GetMany | Operation::GetOne => ServiceError::ResourceFetchFailed,
            Operation::Post => ServiceError::ResourceCreationFailed,
            Operation::Patch => ServiceError::ResourceUpdateFailed,
            Operation::Delete => ServiceError::ResourceDeletionFailed,
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::GetMany => "Failed to fetch resource(s)",
            Operation::GetOne => "Failed to fetch resource",
            Operation::Post => "Failed to create resource",
            Operation::Patch => "Failed to update resource",
            Operation::Delete => "Failed to delete resource",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_name_it_prints() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
        }
        assert_eq!(
            "put".parse::<Operation>(),
            Err(UnknownOperation("put".into()))
        );
    }

    #[test]
    fn failure_kinds_follow_the_operation() {
        assert_eq!(Operation::GetMany.failure_kind(), ServiceError::ResourceFetchFailed);
        assert_eq!(Operation::Post.failure_kind(), ServiceError::ResourceCreationFailed);
        assert_eq!(Operation::Patch.failure_kind(), ServiceError::ResourceUpdateFailed);
        assert_eq!(Operation::Delete.failure_kind(), ServiceError::ResourceDeletionFailed);
    }
}

//! Caller identification and authorization

use std::collections::HashSet;
use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use itemdesk_core::{Action, Authorizer, OperationContext, RecordId};

pub const ACTOR_HEADER: &str = "X-Actor";
pub const ANONYMOUS: &str = "anonymous";

/// The calling actor, from `Authorization: Bearer <actor>` or `X-Actor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn context(&self) -> OperationContext {
        OperationContext::new(self.0.clone())
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor(actor_from_parts(parts)))
    }
}

fn actor_from_parts(parts: &Parts) -> String {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(token) = header("Authorization").and_then(|h| h.strip_prefix("Bearer ")) {
        let token = token.trim();
        if !token.is_empty() {
            return token.to_string();
        }
    }
    header(ACTOR_HEADER).unwrap_or(ANONYMOUS).to_string()
}

/// Lets everyone read, and everyone except the listed actors write.
#[derive(Debug, Default, Clone)]
pub struct ReadOnlyActors {
    actors: HashSet<String>,
}

impl ReadOnlyActors {
    pub fn new(actors: impl IntoIterator<Item = String>) -> Self {
        Self {
            actors: actors.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl Authorizer for ReadOnlyActors {
    fn authorize(&self, actor: &str, action: Action, _record: Option<RecordId>) -> bool {
        !(action.is_mutating() && self.actors.contains(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_wins_over_header() {
        let p = parts(&[("Authorization", "Bearer dana"), ("X-Actor", "lee")]);
        assert_eq!(actor_from_parts(&p), "dana");
    }

    #[test]
    fn test_actor_header() {
        let p = parts(&[("X-Actor", "lee")]);
        assert_eq!(actor_from_parts(&p), "lee");
    }

    #[test]
    fn test_anonymous_default() {
        assert_eq!(actor_from_parts(&parts(&[])), ANONYMOUS);
        let p = parts(&[("Authorization", "Basic Zm9vOmJhcg==")]);
        assert_eq!(actor_from_parts(&p), ANONYMOUS);
    }

    #[test]
    fn test_read_only_actors() {
        let auth = ReadOnlyActors::new(vec!["auditor".to_string()]);
        assert!(auth.authorize("auditor", Action::Read, None));
        assert!(!auth.authorize("auditor", Action::Update, None));
        assert!(auth.authorize("dana", Action::Delete, None));
    }
}

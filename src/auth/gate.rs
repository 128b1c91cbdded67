//! Per-request access control.
//!
//! Every route group declares a [`RoutePolicy`]. The gate reads it first: public
//! routes pass untouched; everything else needs a valid bearer token, whose
//! identity is attached to the request, and then must satisfy the declared
//! roles. Nothing is cached between requests.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{
    auth::{
        claims::Identity,
        jwt::{JwtKeys, TokenError},
        repo_types::Role,
    },
    error::AppError,
};

/// Static access declaration for a group of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub public: bool,
    pub roles: &'static [Role],
}

impl RoutePolicy {
    pub const PUBLIC: RoutePolicy = RoutePolicy {
        public: true,
        roles: &[],
    };
    pub const AUTHENTICATED: RoutePolicy = RoutePolicy {
        public: false,
        roles: &[],
    };
    pub const ADMIN: RoutePolicy = RoutePolicy {
        public: false,
        roles: &[Role::Admin],
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Unauthenticated(&'static str),
    Forbidden(&'static str),
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::Unauthenticated(msg) => AppError::Unauthenticated(msg.into()),
            Rejection::Forbidden(msg) => AppError::Forbidden(msg.into()),
        }
    }
}

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Public,
    Authorized(Identity),
    Rejected(Rejection),
}

#[derive(Clone)]
pub struct AccessGate {
    keys: JwtKeys,
    policy: RoutePolicy,
}

impl AccessGate {
    pub fn new(keys: JwtKeys, policy: RoutePolicy) -> Self {
        Self { keys, policy }
    }

    pub fn evaluate(&self, headers: &HeaderMap) -> GateDecision {
        if self.policy.public {
            return GateDecision::Public;
        }

        let identity = match bearer_token(headers).and_then(|token| self.authenticate(token)) {
            Ok(identity) => identity,
            Err(rejection) => return GateDecision::Rejected(rejection),
        };

        match check_roles(Some(&identity), self.policy.roles) {
            Ok(()) => GateDecision::Authorized(identity),
            Err(rejection) => GateDecision::Rejected(rejection),
        }
    }

    fn authenticate(&self, token: &str) -> Result<Identity, Rejection> {
        self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            Rejection::Unauthenticated(match e {
                TokenError::Expired => "Authentication failed: token expired",
                TokenError::Invalid(_) => "Authentication failed: invalid token",
                TokenError::MissingClaim(_) => "Invalid token payload",
                TokenError::MissingRole => "Missing role in token",
            })
        })
    }
}

/// Pulls `<token>` out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers.get(header::AUTHORIZATION).ok_or(Rejection::Unauthenticated(
        "Authentication required. Please provide a valid JWT token.",
    ))?;
    let value = value
        .to_str()
        .map_err(|_| Rejection::Unauthenticated("Invalid Authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(Rejection::Unauthenticated("Invalid Authorization header"))?
        .trim();
    if token.is_empty() {
        return Err(Rejection::Unauthenticated("Invalid Authorization header"));
    }
    Ok(token)
}

/// Exact role match; an empty requirement always passes.
pub fn check_roles(identity: Option<&Identity>, required: &[Role]) -> Result<(), Rejection> {
    if required.is_empty() {
        return Ok(());
    }
    let identity = identity.ok_or(Rejection::Forbidden("No user found in request"))?;
    if required.contains(&identity.role) {
        Ok(())
    } else {
        warn!(user_id = identity.user_id, role = identity.role.as_str(), "role not permitted");
        Err(Rejection::Forbidden("Insufficient role for this endpoint"))
    }
}

/// Middleware entry point; mount with `from_fn_with_state(AccessGate::new(..), access_gate)`.
pub async fn access_gate(State(gate): State<AccessGate>, mut req: Request, next: Next) -> Response {
    match gate.evaluate(req.headers()) {
        GateDecision::Public => next.run(req).await,
        GateDecision::Authorized(identity) => {
            debug!(user_id = identity.user_id, "request authorized");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        GateDecision::Rejected(rejection) => AppError::from(rejection).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, Header};
    use serde_json::json;
    use time::OffsetDateTime;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&AppConfig::test_default().jwt)
    }

    fn token_for(id: i32, role: Role) -> String {
        let now = OffsetDateTime::now_utc();
        let user = crate::auth::repo_types::User {
            id,
            email: format!("u{id}@example.com"),
            password_hash: String::new(),
            first_name: "User".into(),
            last_name: String::new(),
            is_active: true,
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        keys().sign(&user).unwrap()
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn public_route_skips_all_checks() {
        let gate = AccessGate::new(keys(), RoutePolicy::PUBLIC);
        assert_eq!(gate.evaluate(&HeaderMap::new()), GateDecision::Public);
        assert_eq!(gate.evaluate(&headers_with("Bearer garbage")), GateDecision::Public);
    }

    #[test]
    fn protected_route_attaches_identity() {
        let gate = AccessGate::new(keys(), RoutePolicy::AUTHENTICATED);
        let token = token_for(42, Role::User);
        let decision = gate.evaluate(&headers_with(&format!("Bearer {token}")));
        assert_eq!(
            decision,
            GateDecision::Authorized(Identity {
                user_id: 42,
                email: "u42@example.com".into(),
                role: Role::User,
            })
        );
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        let gate = AccessGate::new(keys(), RoutePolicy::AUTHENTICATED);
        for headers in [
            HeaderMap::new(),
            headers_with("Token abc"),
            headers_with("Bearer "),
            headers_with("Bearer not.a.jwt"),
        ] {
            assert!(matches!(
                gate.evaluate(&headers),
                GateDecision::Rejected(Rejection::Unauthenticated(_))
            ));
        }
    }

    #[test]
    fn role_less_token_is_unauthenticated_not_forbidden() {
        let k = keys();
        let token = encode(
            &Header::default(),
            &json!({
                "sub": "1", "email": "a@b.co",
                "iss": k.issuer.clone(), "aud": k.audience.clone(),
                "exp": OffsetDateTime::now_utc().unix_timestamp() + 600,
            }),
            &k.encoding,
        )
        .unwrap();
        let gate = AccessGate::new(k, RoutePolicy::ADMIN);
        assert_eq!(
            gate.evaluate(&headers_with(&format!("Bearer {token}"))),
            GateDecision::Rejected(Rejection::Unauthenticated("Missing role in token"))
        );
    }

    #[test]
    fn admin_route_forbids_plain_users() {
        let gate = AccessGate::new(keys(), RoutePolicy::ADMIN);
        let user_token = token_for(1, Role::User);
        let admin_token = token_for(2, Role::Admin);
        assert!(matches!(
            gate.evaluate(&headers_with(&format!("Bearer {user_token}"))),
            GateDecision::Rejected(Rejection::Forbidden(_))
        ));
        assert!(matches!(
            gate.evaluate(&headers_with(&format!("Bearer {admin_token}"))),
            GateDecision::Authorized(_)
        ));
    }

    #[test]
    fn check_roles_rules() {
        let admin = Identity {
            user_id: 1,
            email: "a@b.co".into(),
            role: Role::Admin,
        };
        assert_eq!(check_roles(None, &[]), Ok(()));
        assert_eq!(check_roles(Some(&admin), &[]), Ok(()));
        assert_eq!(check_roles(Some(&admin), &[Role::Admin]), Ok(()));
        // No inheritance: an admin does not satisfy a USER-only route.
        assert!(matches!(
            check_roles(Some(&admin), &[Role::User]),
            Err(Rejection::Forbidden(_))
        ));
        assert!(matches!(
            check_roles(None, &[Role::Admin]),
            Err(Rejection::Forbidden(_))
        ));
    }
}

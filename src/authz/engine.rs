use std::collections::HashSet;

use crate::authz::errors::{AuthzError, Denial};
use crate::authz::resolver::PermissionResolver;
use crate::authz::types::{
    AuthorizationRequirement, MatchMode, PermissionSet, Principal, RouteAuthorization,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial),
        }
    }
}

/// Decide whether `principal` may invoke a route guarded by `route`.
///
/// Public routes and routes without a requirement are allowed before the
/// principal is even looked at. Every other path does exactly one resolver
/// call. Only store failures come back as `Err`; all refusals are
/// `Ok(Decision::Deny(..))`.
pub async fn authorize<R>(
    resolver: &R,
    route: &RouteAuthorization,
    principal: Option<&Principal>,
) -> Result<Decision, AuthzError>
where
    R: PermissionResolver + ?Sized,
{
    if route.public {
        return Ok(Decision::Allow);
    }

    if route.requirement.is_unrestricted() {
        return Ok(Decision::Allow);
    }

    let Some(principal) = principal else {
        return Ok(deny(Denial::AuthenticationMissing, None));
    };

    let Some(role) = principal.role_name() else {
        return Ok(deny(Denial::RoleMissing, Some(principal)));
    };

    let permissions = match resolver.resolve(role).await {
        Ok(permissions) => permissions,
        Err(AuthzError::Denied(denial)) => return Ok(deny(denial, Some(principal))),
        Err(e) => return Err(e),
    };

    let decision = evaluate(&route.requirement, &permissions);
    match &decision {
        Decision::Allow => tracing::debug!(
            subject = principal.subject_id,
            role,
            "Authorization granted"
        ),
        Decision::Deny(denial) => {
            deny_log(denial, Some(principal));
        }
    }
    Ok(decision)
}

/// Match a requirement against an effective permission set.
///
/// A non-empty all-of list is the only list ever checked when present.
pub fn evaluate(requirement: &AuthorizationRequirement, permissions: &PermissionSet) -> Decision {
    match requirement {
        AuthorizationRequirement::AllOf(required) if !required.is_empty() => {
            let mut seen = HashSet::new();
            let missing: Vec<String> = required
                .iter()
                .filter(|p| seen.insert(*p) && !permissions.satisfies(p))
                .cloned()
                .collect();
            if missing.is_empty() {
                Decision::Allow
            } else {
                Decision::Deny(Denial::PermissionDenied {
                    mode: MatchMode::AllOf,
                    permissions: missing,
                })
            }
        }
        AuthorizationRequirement::AnyOf(alternatives) if !alternatives.is_empty() => {
            if alternatives.iter().any(|p| permissions.satisfies(p)) {
                Decision::Allow
            } else {
                Decision::Deny(Denial::PermissionDenied {
                    mode: MatchMode::AnyOf,
                    permissions: alternatives.clone(),
                })
            }
        }
        _ => Decision::Allow,
    }
}

fn deny(denial: Denial, principal: Option<&Principal>) -> Decision {
    deny_log(&denial, principal);
    Decision::Deny(denial)
}

fn deny_log(denial: &Denial, principal: Option<&Principal>) {
    tracing::info!(
        subject = principal.map(|p| p.subject_id),
        role = principal.and_then(Principal::role_name),
        code = denial.reason_code(),
        reason = %denial,
        "Authorization denied"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory resolver that counts lookups.
    #[derive(Default)]
    struct StaticResolver {
        roles: HashMap<String, (bool, PermissionSet)>,
        calls: AtomicUsize,
    }

    impl StaticResolver {
        fn with_role(mut self, name: &str, enabled: bool, perms: &[&str]) -> Self {
            self.roles.insert(
                name.to_string(),
                (enabled, perms.iter().copied().collect()),
            );
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PermissionResolver for StaticResolver {
        async fn resolve(&self, role_name: &str) -> Result<PermissionSet, AuthzError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.roles.get(role_name) {
                None => Ok(PermissionSet::new()),
                Some((false, _)) => Err(Denial::RoleDisabled {
                    role: role_name.to_string(),
                }
                .into()),
                Some((true, perms)) => Ok(perms.clone()),
            }
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl PermissionResolver for FailingResolver {
        async fn resolve(&self, _role_name: &str) -> Result<PermissionSet, AuthzError> {
            Err(sea_orm::DbErr::Custom("connection reset".into()).into())
        }
    }

    fn any_of(perms: &[&str]) -> RouteAuthorization {
        RouteAuthorization::requiring(AuthorizationRequirement::any_of(perms.iter().copied()))
    }

    fn all_of(perms: &[&str]) -> RouteAuthorization {
        RouteAuthorization::requiring(AuthorizationRequirement::all_of(perms.iter().copied()))
    }

    #[tokio::test]
    async fn test_public_route_skips_everything() {
        let resolver = StaticResolver::default();
        let mut route = all_of(&["user:delete"]);
        route.public = true;

        let decision = authorize(&resolver, &route, None).await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_route_without_requirement_is_allowed() {
        let resolver = StaticResolver::default();
        for route in [
            RouteAuthorization::default(),
            any_of(&[]),
            all_of(&[]),
        ] {
            let decision = authorize(&resolver, &route, None).await.unwrap();
            assert!(decision.is_allowed());
        }
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_principal_denied_before_store_access() {
        let resolver = StaticResolver::default().with_role("admin", true, &["user:manage"]);

        let decision = authorize(&resolver, &any_of(&["user:read"]), None)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(Denial::AuthenticationMissing));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_principal_without_role_is_denied() {
        let resolver = StaticResolver::default();
        let principal = Principal {
            subject_id: 7,
            role: None,
        };
        let decision = authorize(&resolver, &any_of(&["user:read"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(Denial::RoleMissing));

        let principal = Principal::new(7, "");
        let decision = authorize(&resolver, &any_of(&["user:read"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(Denial::RoleMissing));
        assert_eq!(resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_manage_satisfies_create() {
        let resolver = StaticResolver::default().with_role("admin", true, &["user:manage"]);
        let principal = Principal::new(1, "admin");

        let decision = authorize(&resolver, &any_of(&["user:create"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_manage_does_not_leak_to_other_resources() {
        let resolver = StaticResolver::default().with_role("admin", true, &["user:manage"]);
        let principal = Principal::new(1, "admin");

        for perm in ["role:manage", "role:read", "exam:delete"] {
            let decision = authorize(&resolver, &any_of(&[perm]), Some(&principal))
                .await
                .unwrap();
            assert!(!decision.is_allowed(), "{perm} should be denied");
        }
    }

    #[tokio::test]
    async fn test_all_of_reports_exactly_missing_subset() {
        let resolver =
            StaticResolver::default().with_role("student", true, &["question:read"]);
        let principal = Principal::new(2, "student");

        let decision = authorize(
            &resolver,
            &all_of(&["question:read", "question:update"]),
            Some(&principal),
        )
        .await
        .unwrap();
        assert_eq!(
            decision,
            Decision::Deny(Denial::PermissionDenied {
                mode: MatchMode::AllOf,
                permissions: vec!["question:update".into()],
            })
        );
    }

    #[tokio::test]
    async fn test_all_of_with_two_of_three() {
        let resolver = StaticResolver::default().with_role("r", true, &["a:read", "b:read"]);
        let principal = Principal::new(3, "r");

        let decision = authorize(
            &resolver,
            &all_of(&["a:read", "b:read", "c:read"]),
            Some(&principal),
        )
        .await
        .unwrap();
        let denial = decision.into_result().unwrap_err();
        assert_eq!(denial.missing(), Some(&["c:read".to_string()][..]));
    }

    #[tokio::test]
    async fn test_any_of_one_match_is_enough() {
        let resolver = StaticResolver::default().with_role("r", true, &["a:read"]);
        let principal = Principal::new(3, "r");

        let decision = authorize(&resolver, &any_of(&["a:read", "b:read"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_unknown_role_is_a_zero_permission_role() {
        let resolver = StaticResolver::default();
        let principal = Principal::new(4, "ghost");

        let decision = authorize(&resolver, &any_of(&["user:read"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Deny(Denial::PermissionDenied {
                mode: MatchMode::AnyOf,
                permissions: vec!["user:read".into()],
            })
        );
    }

    #[tokio::test]
    async fn test_disabled_role_vetoes_held_permission() {
        let resolver = StaticResolver::default().with_role("legacy", false, &["content:read"]);
        let principal = Principal::new(5, "legacy");

        let decision = authorize(&resolver, &any_of(&["content:read"]), Some(&principal))
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Deny(Denial::RoleDisabled {
                role: "legacy".into()
            })
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error_not_a_denial() {
        let principal = Principal::new(6, "admin");
        let result = authorize(&FailingResolver, &any_of(&["user:read"]), Some(&principal)).await;
        assert!(matches!(result, Err(AuthzError::Store(_))));
    }

    #[test]
    fn test_evaluate_all_of_ignores_any_of_semantics() {
        let perms: PermissionSet = ["exam:read"].into_iter().collect();
        let decision = evaluate(&AuthorizationRequirement::all_of(["exam:update"]), &perms);
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_evaluate_all_of_reports_repeated_permission_once() {
        let perms: PermissionSet = ["a:read"].into_iter().collect();
        let decision = evaluate(
            &AuthorizationRequirement::all_of(["c:read", "a:read", "c:read", "b:read"]),
            &perms,
        );
        assert_eq!(
            decision,
            Decision::Deny(Denial::PermissionDenied {
                mode: MatchMode::AllOf,
                permissions: vec!["c:read".into(), "b:read".into()],
            })
        );
    }

    #[test]
    fn test_evaluate_all_of_with_manage() {
        let perms: PermissionSet = ["question:manage"].into_iter().collect();
        let decision = evaluate(
            &AuthorizationRequirement::all_of(["question:read", "question:update"]),
            &perms,
        );
        assert_eq!(decision, Decision::Allow);
    }
}

use super::*;
use crate::{DriverDescriptor, GateError, QueryPlan, ROOT_DRIVER_ID, ansi_descriptor};
use std::sync::atomic::{AtomicUsize, Ordering};

fn guard(policies: PolicySet) -> SecurityGuard {
    let mut registry = DriverRegistry::new(ansi_descriptor()).unwrap();
    registry
        .register(
            DriverDescriptor::new("embedded")
                .display_name("Embedded")
                .parent(ROOT_DRIVER_ID)
                .default_admin_user("sa"),
        )
        .unwrap();
    registry
        .register(DriverDescriptor::new("embedded-child").parent("embedded"))
        .unwrap();
    SecurityGuard::new(Arc::new(registry), policies)
}

fn metadata(driver: &str, connection_string: &str) -> ConnectionMetadata {
    ConnectionMetadata::new(driver, ConnectionDescriptor::decode(connection_string).unwrap())
}

#[test]
fn test_default_admin_is_denied_for_native_queries() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(
            &Query::native("SELECT 1"),
            &metadata("embedded", "file:/data/db;ACCESS_MODE_DATA=rws;USER=sa"),
        )
        .unwrap();
    assert!(!decision.allowed);
    assert!(matches!(
        decision.reason,
        Some(SecurityViolation::DefaultCredentialViolation { .. })
    ));
}

#[test]
fn test_admin_match_ignores_case_and_inherits() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(
            &Query::native("SELECT 1"),
            &metadata("embedded-child", "file:/db;USER=SA"),
        )
        .unwrap();
    assert!(!decision.allowed);
}

#[test]
fn test_empty_user_is_denied() {
    let guard = guard(PolicySet::default());
    for connection_string in ["file:/db", "file:/db;USER="] {
        let decision = guard
            .authorize(&Query::native("SELECT 1"), &metadata("embedded", connection_string))
            .unwrap();
        assert!(!decision.allowed, "{connection_string}");
    }
}

#[test]
fn test_metadata_user_wins_over_connection_string() {
    let guard = guard(PolicySet::default());
    let meta = metadata("embedded", "file:/db;USER=sa").with_user("analyst");
    assert_eq!(meta.resolved_user(), "analyst");
    let decision = guard.authorize(&Query::native("SELECT 1"), &meta).unwrap();
    assert!(decision.allowed);
}

#[test]
fn test_other_users_without_ddl_are_allowed() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(
            &Query::native("SELECT * FROM orders; SELECT 2"),
            &metadata("embedded", "file:/db;USER=analyst"),
        )
        .unwrap();
    assert_eq!(decision, SecurityDecision::allow());
    assert!(decision.into_result().is_ok());
}

#[test]
fn test_ddl_is_denied_by_default_policy() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(
            &Query::native("SELECT 1; DROP TABLE x;"),
            &metadata("embedded", "file:/db;USER=analyst"),
        )
        .unwrap();
    assert_eq!(
        decision.reason,
        Some(SecurityViolation::DisallowedStatementCategory {
            driver: "Embedded".to_string(),
            class_name: "DROP TABLE".to_string(),
        })
    );
    let err = decision.into_result().unwrap_err();
    assert!(matches!(
        err.security_violation(),
        Some(SecurityViolation::DisallowedStatementCategory { .. })
    ));
}

#[test]
fn test_policy_can_allow_schema_mutation_for_a_driver_chain() {
    let permissive = SecurityPolicy {
        allow_schema_mutation: true,
        ..SecurityPolicy::default()
    };
    let guard = guard(PolicySet::default().with_policy("embedded", permissive));
    let decision = guard
        .authorize(
            &Query::native("CREATE TABLE t (a INT)"),
            &metadata("embedded-child", "file:/db;USER=analyst"),
        )
        .unwrap();
    assert!(decision.allowed);

    let decision = guard
        .authorize(&Query::native("CREATE TABLE t (a INT)"), &metadata("sql", "db"))
        .unwrap();
    assert!(!decision.allowed);
}

#[test]
fn test_unparseable_statements_follow_policy() {
    let sql = "SELEKT nonsense";
    let meta = metadata("embedded", "file:/db;USER=analyst");

    let lenient = guard(PolicySet::default());
    assert!(lenient.authorize(&Query::native(sql), &meta).unwrap().allowed);

    let strict = guard(PolicySet::new(SecurityPolicy {
        allow_schema_mutation: false,
        allow_unparseable: false,
    }));
    let decision = strict.authorize(&Query::native(sql), &meta).unwrap();
    assert_eq!(decision.reason, Some(SecurityViolation::UnparseableStatement));
}

#[test]
fn test_drivers_without_admin_account_skip_credential_check() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(&Query::native("SELECT 1"), &metadata("sql", "db"))
        .unwrap();
    assert!(decision.allowed);
}

#[test]
fn test_plans_skip_statement_checks() {
    let guard = guard(PolicySet::default());
    let decision = guard
        .authorize(
            &Query::Plan(QueryPlan::new("orders")),
            &metadata("embedded", "file:/db;USER=sa"),
        )
        .unwrap();
    assert!(decision.allowed);
}

#[test]
fn test_unknown_driver_is_an_error() {
    let guard = guard(PolicySet::default());
    let err = guard
        .authorize(&Query::native("SELECT 1"), &metadata("oracle", "db"))
        .unwrap_err();
    assert!(matches!(err, GateError::UnknownDriver(_)));
}

struct CountingSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl MetadataSource for CountingSource {
    async fn fetch(&self, connection_id: Uuid) -> Result<ConnectionMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut meta = metadata("embedded", "file:/db;USER=analyst");
        meta.connection_id = connection_id;
        Ok(meta)
    }
}

#[tokio::test]
async fn test_metadata_cache_reuses_fresh_entries() {
    let cache = MetadataCache::new(
        CountingSource {
            fetches: AtomicUsize::new(0),
        },
        Duration::from_secs(60),
    );
    let id = Uuid::new_v4();

    let first = cache.get(id).await.unwrap();
    let second = cache.get(id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.connection_id, id);
    assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 1);

    cache.invalidate(id);
    cache.get(id).await.unwrap();
    assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metadata_cache_refetches_stale_entries() {
    let cache = MetadataCache::new(
        CountingSource {
            fetches: AtomicUsize::new(0),
        },
        Duration::ZERO,
    );
    let id = Uuid::new_v4();
    cache.get(id).await.unwrap();
    cache.get(id).await.unwrap();
    assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metadata_cache_evicts_expired_entries_on_fetch() {
    let cache = MetadataCache::new(
        CountingSource {
            fetches: AtomicUsize::new(0),
        },
        Duration::ZERO,
    );
    assert!(cache.is_empty());
    for _ in 0..3 {
        cache.get(Uuid::new_v4()).await.unwrap();
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 3);
}

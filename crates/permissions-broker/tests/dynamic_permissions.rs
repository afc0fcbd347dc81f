use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_core_types::{
    Action, Effect, ErrorKind, Identity, IdentityPermission, IdentityPermissionKey, IdentityType,
    Permission,
};
use gatekeeper_group_registry::{
    CreateGroupRequest, GroupError, GroupManagement, GroupStatus, InMemoryGroupRegistry,
};
use gatekeeper_permissions_broker::{
    BatchDeleteOutcome, BatchWriteOutcome, CreateIdentityPermissionsRequest,
    DeleteIdentityPermissionsRequest, DynamicPermissionsSource, IdentityPermissionStore,
    InMemoryIdentityPermissionStore, PermissionsSource, SourceError, StoreError,
};
use gatekeeper_policy_center::default_policy_file;

fn grant(identity_id: &str, subject_id: &str) -> IdentityPermission {
    IdentityPermission::new(
        IdentityType::User,
        identity_id,
        Effect::Allow,
        Action::Read,
        "Project",
        subject_id,
    )
}

fn source_with(
    store: Arc<dyn IdentityPermissionStore>,
    groups: Arc<InMemoryGroupRegistry>,
    configure: impl FnOnce(&mut gatekeeper_policy_center::PolicyFile),
) -> DynamicPermissionsSource {
    let mut policy = default_policy_file();
    configure(&mut policy);
    DynamicPermissionsSource::new(store, groups, &policy).expect("valid policy")
}

/// Rejects every second batch write.
struct FlakyStore {
    inner: InMemoryIdentityPermissionStore,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn new(max_batch_size: usize) -> Self {
        Self {
            inner: InMemoryIdentityPermissionStore::with_max_batch_size(max_batch_size),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityPermissionStore for FlakyStore {
    async fn get_by_identity(
        &self,
        identity_type: IdentityType,
        identity_id: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError> {
        self.inner.get_by_identity(identity_type, identity_id).await
    }

    async fn list_by_subject_type(
        &self,
        subject_type: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError> {
        self.inner.list_by_subject_type(subject_type).await
    }

    async fn batch_put(
        &self,
        records: Vec<IdentityPermission>,
    ) -> Result<BatchWriteOutcome, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(StoreError::Unavailable("throttled".into()));
        }
        self.inner.batch_put(records).await
    }

    async fn batch_delete(
        &self,
        keys: Vec<IdentityPermissionKey>,
    ) -> Result<BatchDeleteOutcome, StoreError> {
        self.inner.batch_delete(keys).await
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }
}

#[tokio::test]
async fn creating_twice_does_not_duplicate() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let request = CreateIdentityPermissionsRequest {
        identity_permissions: vec![grant("u-1", "p-1"), grant("u-1", "p-1")],
    };
    let first = source
        .create_identity_permissions(request.clone())
        .await
        .unwrap();
    let second = source.create_identity_permissions(request).await.unwrap();
    assert!(first.created && second.created);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn deleting_missing_records_is_a_no_op() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let response = source
        .delete_identity_permissions(DeleteIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-404")],
        })
        .await
        .unwrap();
    assert!(!response.deleted);
    assert!(response.unprocessed_keys.is_empty());

    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-1")],
        })
        .await
        .unwrap();
    let response = source
        .delete_identity_permissions(DeleteIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-1")],
        })
        .await
        .unwrap();
    assert!(response.deleted);
    assert!(store.is_empty());
}

#[tokio::test]
async fn failed_chunks_are_reported_as_unprocessed() {
    let store = Arc::new(FlakyStore::new(2));
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let records: Vec<_> = (0..5).map(|i| grant("u-1", &format!("p-{i}"))).collect();

    let response = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: records,
        })
        .await
        .unwrap();

    // chunks of 2: [p-0, p-1] ok, [p-2, p-3] rejected, [p-4] ok
    assert!(!response.created);
    let unprocessed: Vec<_> = response
        .unprocessed_identity_permissions
        .iter()
        .map(|record| record.subject_id.as_str())
        .collect();
    assert_eq!(unprocessed, vec!["p-2", "p-3"]);
    let stored = store
        .get_by_identity(IdentityType::User, "u-1")
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn configured_batch_size_caps_chunks() {
    let store = Arc::new(FlakyStore::new(25));
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |policy| {
        policy.settings.dynamic.batch_size = 1;
    });
    let response = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-1"), grant("u-1", "p-2")],
        })
        .await
        .unwrap();
    assert_eq!(response.unprocessed_identity_permissions.len(), 1);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn per_identity_limit_is_a_resource_limit() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |policy| {
        policy.settings.dynamic.max_permissions_per_identity = 2;
    });
    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-1"), grant("u-1", "p-2")],
        })
        .await
        .unwrap();

    // re-creating an existing record does not count against the limit
    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-2")],
        })
        .await
        .unwrap();

    let err = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-3")],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::TooManyRequests { limit: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
    assert!(err.kind().is_retryable());
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn group_records_reach_members_only() {
    let groups = Arc::new(InMemoryGroupRegistry::new());
    groups
        .create_group(CreateGroupRequest::named("editors"))
        .await
        .unwrap();
    GroupManagement::add_user_to_group(groups.as_ref(), "u-1", "editors")
        .await
        .unwrap();
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store, groups, |_| {});

    let mut group_grant = grant("editors", "*");
    group_grant.identity_type = IdentityType::Group;
    group_grant.action = Action::Update;
    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![group_grant],
        })
        .await
        .unwrap();

    let member = source
        .get_permissions_by_user(&Identity::new("u-1"))
        .await
        .unwrap();
    assert_eq!(member, vec![Permission::allow(Action::Update, "Project|*")]);
    let outsider = source
        .get_permissions_by_user(&Identity::new("u-2"))
        .await
        .unwrap();
    assert!(outsider.is_empty());
}

#[tokio::test]
async fn deleting_a_subject_removes_every_identity_record() {
    let store = Arc::new(InMemoryIdentityPermissionStore::with_max_batch_size(1));
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![
                grant("u-1", "p-1"),
                grant("u-2", "p-1"),
                grant("u-3", "p-2"),
            ],
        })
        .await
        .unwrap();

    let response = source
        .delete_subject_identity_permissions("Project", "p-1")
        .await
        .unwrap();
    assert!(response.deleted);
    assert_eq!(store.len(), 1);
    let remaining = source
        .get_identity_permissions_by_identity(IdentityType::User, "u-3")
        .await
        .unwrap();
    assert_eq!(remaining, vec![grant("u-3", "p-2")]);
}

#[tokio::test]
async fn malformed_records_are_rejected_before_writing() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let err = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![grant("u-1", "p-1"), grant("", "p-2")],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(store.is_empty());
}

#[tokio::test]
async fn separators_inside_values_keep_records_distinct() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});

    let mut hashed_type = grant("u-1", "c");
    hashed_type.subject_type = "A#B".into();
    let mut hashed_id = grant("u-1", "B#c");
    hashed_id.subject_type = "A".into();
    let joined_field = grant("u-1", "p-1").with_fields(["a,b"]);
    let split_fields = grant("u-1", "p-1").with_fields(["a", "b"]);

    let response = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![hashed_type, hashed_id, joined_field, split_fields],
        })
        .await
        .unwrap();
    assert!(response.created);
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn stored_records_cannot_be_rewritten() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let mut original = grant("u-1", "p-1").with_reason("original");
    original.effect = Effect::Deny;
    source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![original.clone()],
        })
        .await
        .unwrap();

    let rewritten = original.clone().with_reason("rewritten");
    let err = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![rewritten],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::AlreadyExists(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = store
        .get_by_identity(IdentityType::User, "u-1")
        .await
        .unwrap();
    assert_eq!(stored, vec![original]);
}

#[tokio::test]
async fn conflicting_duplicates_in_one_request_are_rejected() {
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), Arc::new(InMemoryGroupRegistry::new()), |_| {});
    let err = source
        .create_identity_permissions(CreateIdentityPermissionsRequest {
            identity_permissions: vec![
                grant("u-1", "p-1").with_reason("first"),
                grant("u-1", "p-1").with_reason("second"),
            ],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(store.is_empty());
}

#[tokio::test]
async fn groups_being_torn_down_take_no_new_records() {
    let groups = Arc::new(InMemoryGroupRegistry::new());
    groups
        .create_group(CreateGroupRequest::named("legacy"))
        .await
        .unwrap();
    groups
        .set_group_status("legacy", GroupStatus::DeletePending)
        .await
        .unwrap();
    let store = Arc::new(InMemoryIdentityPermissionStore::new());
    let source = source_with(store.clone(), groups.clone(), |_| {});

    let mut group_grant = grant("legacy", "*");
    group_grant.identity_type = IdentityType::Group;
    let request = CreateIdentityPermissionsRequest {
        identity_permissions: vec![group_grant],
    };

    let err = source
        .create_identity_permissions(request.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::Group(GroupError::NotActive {
            status: GroupStatus::DeletePending,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    groups
        .set_group_status("legacy", GroupStatus::Deleted)
        .await
        .unwrap();
    let err = source.create_identity_permissions(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(store.is_empty());
}

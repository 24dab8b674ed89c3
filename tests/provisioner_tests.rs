//! Provisioning saga tests: the happy path and compensation at every step.


use mcp_control_plane::error::Error;
use mcp_control_plane::provisioner::{
    iam_role_name, namespace_name, PlanTier, ADMIN_ROLE_NAME, QUOTA_NAME, S3_POLICY_NAME,
    SERVICE_ACCOUNT_NAME, USER_ROLE_NAME,
};
use test_support::{provisioner_fixture, TEST_CLUSTER_ARN};

const ORG: &str = "acme";
const BUCKET: &str = "shared-tenant-data";

#[tokio::test]
async fn test_provision_creates_the_full_resource_set() {
    let fixture = provisioner_fixture();

    let account = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap();

    assert_eq!(account.namespace, "tenant-acme");
    assert_eq!(account.s3_bucket, BUCKET);
    assert_eq!(account.s3_prefix, "orgs/acme");
    assert_eq!(account.resource_quota, PlanTier::Pro.quota());

    // Namespace with contract labels.
    let labels = fixture
        .cluster
        .namespace_labels(&account.namespace)
        .await
        .unwrap();
    assert_eq!(labels.get("tenant-id").unwrap(), ORG);
    assert_eq!(labels.get("plan-tier").unwrap(), "pro");
    assert!(labels.contains_key("managed-by"));
    assert!(labels.contains_key("created-at"));

    // Quota from the tier table.
    let quota = fixture
        .cluster
        .quota(&account.namespace, QUOTA_NAME)
        .await
        .unwrap();
    assert_eq!(quota.requests_cpu, "20");
    assert_eq!(quota.max_statefulsets, 10);

    // IAM role with federation trust bound to the tenant service account.
    let role = fixture.iam.role(&iam_role_name(ORG)).await.unwrap();
    assert_eq!(role.arn, account.iam_role_arn);
    assert!(role.trust_policy.contains(TEST_CLUSTER_ARN));
    assert!(role
        .trust_policy
        .contains("system:serviceaccount:tenant-acme:tenant-sa"));
    let s3_policy = role.inline_policies.get(S3_POLICY_NAME).unwrap();
    assert!(s3_policy.contains("arn:aws:s3:::shared-tenant-data/orgs/acme/*"));

    // Service account annotated to assume the role.
    let service_account = fixture
        .cluster
        .service_account(&account.namespace, SERVICE_ACCOUNT_NAME)
        .await
        .unwrap();
    assert_eq!(
        service_account
            .annotations
            .get("eks.amazonaws.com/role-arn")
            .unwrap(),
        &account.iam_role_arn
    );

    // RBAC roles and the isolation policy.
    assert!(fixture
        .cluster
        .role(&account.namespace, ADMIN_ROLE_NAME)
        .await
        .is_some());
    let user_role = fixture
        .cluster
        .role(&account.namespace, USER_ROLE_NAME)
        .await
        .unwrap();
    assert_eq!(user_role.rules[0].verbs, vec!["get", "list", "watch"]);
    assert!(fixture.cluster.has_network_policy(&account.namespace).await);
}

#[tokio::test]
async fn test_provision_without_bucket_skips_s3_policy() {
    let fixture = provisioner_fixture();

    let account = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Free, "")
        .await
        .unwrap();

    assert_eq!(account.s3_bucket, "");
    assert_eq!(account.s3_prefix, "");
    let role = fixture.iam.role(&iam_role_name(ORG)).await.unwrap();
    assert!(role.inline_policies.is_empty());
}

#[tokio::test]
async fn test_quota_failure_deletes_the_namespace() {
    let fixture = provisioner_fixture();
    fixture.cluster.fail_on("create_resource_quota").await;

    let err = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Free, BUCKET)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cluster(_)));

    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_iam_role_failure_deletes_the_namespace() {
    let fixture = provisioner_fixture();
    fixture.iam.fail_on("create_role").await;

    let err = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Starter, BUCKET)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Iam(_)));

    // The namespace created in step 1 is gone before the error returns.
    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
}

#[tokio::test]
async fn test_s3_policy_failure_rolls_back_namespace_and_role() {
    let fixture = provisioner_fixture();
    fixture.iam.fail_on("put_role_policy").await;

    let err = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Iam(_)));

    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_service_account_failure_rolls_back_everything() {
    let fixture = provisioner_fixture();
    fixture.cluster.fail_on("create_service_account").await;

    fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap_err();

    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_rbac_failure_rolls_back_everything() {
    let fixture = provisioner_fixture();
    fixture.cluster.fail_on("create_role").await;

    fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap_err();

    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_network_policy_failure_does_not_fail_the_provision() {
    let fixture = provisioner_fixture();
    fixture.cluster.fail_on("apply_network_policy").await;

    let account = fixture
        .provisioner
        .provision_account(ORG, PlanTier::Free, "")
        .await
        .unwrap();

    assert!(fixture.cluster.namespace_exists(&account.namespace).await);
    assert!(!fixture.cluster.has_network_policy(&account.namespace).await);
}

#[tokio::test]
async fn test_rollback_continues_past_its_own_failures() {
    let fixture = provisioner_fixture();
    fixture.cluster.fail_on("create_service_account").await;
    // Namespace deletion fails during rollback; the role must still go.
    fixture.cluster.fail_on("delete_namespace").await;

    fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap_err();

    // The namespace is orphaned (deletion was failing) but the IAM side
    // was still compensated.
    assert!(fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_delete_account_removes_namespace_policy_and_role() {
    let fixture = provisioner_fixture();
    fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap();

    fixture.provisioner.delete_account(ORG).await.unwrap();

    assert!(!fixture.cluster.namespace_exists(&namespace_name(ORG)).await);
    assert!(!fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_delete_account_fails_when_namespace_deletion_fails() {
    let fixture = provisioner_fixture();
    fixture
        .provisioner
        .provision_account(ORG, PlanTier::Pro, BUCKET)
        .await
        .unwrap();

    fixture.cluster.fail_on("delete_namespace").await;
    let err = fixture.provisioner.delete_account(ORG).await.unwrap_err();
    assert!(matches!(err, Error::Cluster(_)));

    // Namespace deletion is the first and fatal step; the role survives.
    assert!(fixture.iam.role_exists(&iam_role_name(ORG)).await);
}

#[tokio::test]
async fn test_empty_organization_id_is_rejected() {
    let fixture = provisioner_fixture();
    let err = fixture
        .provisioner
        .provision_account("", PlanTier::Free, "")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

//! End-to-end admission reviews through the webhook router.
use assert_json_diff::assert_json_include;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use http_body_util::BodyExt;
use proxy_webhook::{server::router, ProxyRewriter};
use proxy_webhook_kubeconfig::Kubeconfig;
use serde_json::{json, Value};
use tower::ServiceExt;

const PROXY: &str = "https://capsule-proxy.capsule-system.svc:9001";

const KUBECONFIG: &str = "apiVersion: v1
kind: Config
clusters:
- name: tenant
  cluster:
    certificate-authority-data: LS0tLS1CRUdJTg==
    server: https://10.0.0.1:6443
contexts:
- name: alice@tenant
  context:
    cluster: tenant
    user: alice
current-context: alice@tenant
users:
- name: alice
  user:
    token: s3cr3t
";

fn app() -> Router {
    router(ProxyRewriter::new("config", PROXY))
}

fn admission_review(api_version: &str, resource: &str, data: Value) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "", "version": "v1", "kind": "ConfigMap"},
            "resource": {"group": "", "version": "v1", "resource": resource},
            "operation": "CREATE",
            "name": "impersonation-shell-admin-kubeconfig-alice",
            "namespace": "tenant-a",
            "userInfo": {"username": "system:serviceaccount:capsule-system:shell"},
            "object": {
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "impersonation-shell-admin-kubeconfig-alice", "namespace": "tenant-a"},
                "data": data,
            },
            "dryRun": false,
        }
    })
}

async fn post(app: Router, content_type: Option<&str>, body: impl Into<Body>) -> (StatusCode, Value) {
    let mut req = Request::post("/mutate");
    if let Some(content_type) = content_type {
        req = req.header(header::CONTENT_TYPE, content_type);
    }
    let res = app.oneshot(req.body(body.into()).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_review(review: Value) -> (StatusCode, Value) {
    post(app(), Some("application/json"), review.to_string()).await
}

fn decoded_patch(response: &Value) -> Value {
    let encoded = response["response"]["patch"].as_str().unwrap();
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn configmap_kubeconfig_is_pointed_at_proxy() {
    let (status, body) = post_review(admission_review(
        "admission.k8s.io/v1",
        "configmaps",
        json!({"config": KUBECONFIG}),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: &body,
        expected: json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "response": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "allowed": true,
                "patchType": "JSONPatch",
            }
        })
    );

    let patch = decoded_patch(&body);
    let ops = patch.as_array().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["op"], "replace");
    assert_eq!(ops[0]["path"], "/data/config");

    let rewritten = Kubeconfig::from_yaml(ops[0]["value"].as_str().unwrap()).unwrap();
    let server = rewritten.clusters[0].cluster.as_ref().unwrap().server.as_deref();
    assert_eq!(server, Some(PROXY));
    assert_eq!(rewritten.current_context.as_deref(), Some("alice@tenant"));

    let yaml: serde_yaml::Value = serde_yaml::from_str(ops[0]["value"].as_str().unwrap()).unwrap();
    assert_eq!(yaml["users"][0]["user"]["token"], "s3cr3t");
}

#[tokio::test]
async fn missing_key_is_denied() {
    let (status, body) = post_review(admission_review(
        "admission.k8s.io/v1",
        "configmaps",
        json!({"kubeconfig": KUBECONFIG}),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: &body,
        expected: json!({
            "response": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "allowed": false,
                "status": {"message": "the configmap does not contain a key with name 'config'"},
            }
        })
    );
    assert!(body["response"].get("patch").is_none());
    assert!(body["response"].get("patchType").is_none());
}

#[tokio::test]
async fn unparseable_kubeconfig_is_denied() {
    let (status, body) = post_review(admission_review(
        "admission.k8s.io/v1",
        "configmaps",
        json!({"config": "clusters: [unterminated"}),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    let message = body["response"]["status"]["message"].as_str().unwrap();
    assert!(message.starts_with("error when loading client cmd config: "), "{message}");
}

#[tokio::test]
async fn other_resources_are_allowed_unchanged() {
    let (status, body) = post_review(admission_review(
        "admission.k8s.io/v1",
        "secrets",
        json!({"config": KUBECONFIG}),
    ))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], true);
    assert!(body["response"].get("patch").is_none());
}

#[tokio::test]
async fn strict_validation_denies_dangling_context() {
    let dangling = KUBECONFIG.replace("cluster: tenant", "cluster: nowhere");
    let review = admission_review("admission.k8s.io/v1", "configmaps", json!({ "config": dangling }));

    let strict = router(ProxyRewriter::new("config", PROXY).validating(true));
    let (status, body) = post(strict, Some("application/json"), review.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(
        body["response"]["status"]["message"],
        "error validating the kubeconfig: invalid configuration: cluster \"nowhere\" was not found for context \"alice@tenant\""
    );

    let (status, body) = post(app(), Some("application/json"), review.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], true);
    let patch = decoded_patch(&body);
    assert!(patch[0]["value"].as_str().unwrap().contains("cluster: nowhere"));
}

#[tokio::test]
async fn v1beta1_reviews_are_answered_in_kind() {
    let (_, body) = post_review(admission_review(
        "admission.k8s.io/v1beta1",
        "configmaps",
        json!({"config": KUBECONFIG}),
    ))
    .await;
    assert_eq!(body["apiVersion"], "admission.k8s.io/v1beta1");
    assert_eq!(body["response"]["allowed"], true);
}

#[tokio::test]
async fn non_json_content_type_is_unsupported() {
    let review = admission_review("admission.k8s.io/v1", "configmaps", json!({"config": KUBECONFIG}));
    let (status, body) = post(app(), Some("text/plain"), review.to_string()).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(body["response"]["status"]["reason"], "InvalidRequest");

    let (status, _) = post(app(), None, review.to_string()).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (status, body) = post(app(), Some("application/json; charset=utf-8"), "{\"kind\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(body["response"]["status"]["code"], 400);
}

#[tokio::test]
async fn healthz() {
    let res = app()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

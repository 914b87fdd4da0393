//! Quick-create integration tests
//!
//! Drives the inline lookup-creation flow through a FormController:
//! - code derivation inside the sub-form
//! - option learning and write-back into the originating field
//! - failure handling and retry

use std::sync::Arc;

use form_actions::{ActionError, ActionResponse, MockExecutor};
use form_engine::{FormController, FormError, Topic};
use form_schema::{
    ActionDescriptor, FieldSchema, FieldType, FormFieldOption, FormSchema, QuickCreateConfig,
};
use serde_json::json;

fn group_schema() -> FormSchema {
    FormSchema::from_fields(
        "group-form",
        vec![
            FieldSchema::text("name").required(),
            FieldSchema::select("ministry")
                .with_label("Ministry")
                .with_lookup("ministries")
                .with_options(vec![FormFieldOption::new("worship", "Worship")])
                .with_quick_create(QuickCreateConfig {
                    label: Some("New ministry".to_string()),
                    ..Default::default()
                }),
            FieldSchema::new("tags", FieldType::MultiSelect)
                .with_lookup("tags")
                .with_quick_create(QuickCreateConfig {
                    action: Some(ActionDescriptor::new("tags.create")),
                    ..Default::default()
                }),
        ],
    )
    .with_submit_action(ActionDescriptor::new("groups.save"))
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_quick_create_learns_and_selects_option() {
    let executor = Arc::new(
        MockExecutor::new("mock").with_response("lookups.quickCreate", ActionResponse::ok(json!({}))),
    );
    let mut form = FormController::new(group_schema(), json!({}))
        .unwrap()
        .with_executor(executor.clone());

    let session = form.open_quick_create("ministry").unwrap();
    assert_eq!(session.title, "New ministry");
    assert!(session.code.is_empty());

    form.set_quick_create_name("Youth Ministry").unwrap();
    assert_eq!(form.quick_create().unwrap().code, "youth-ministry");

    let option = form.submit_quick_create().await.unwrap();
    assert_eq!(option, FormFieldOption::new("youth-ministry", "Youth Ministry"));

    assert!(form.quick_create().is_none());
    assert_eq!(form.value("ministry"), Some(&json!("youth-ministry")));
    assert!(form
        .options("ministry")
        .contains(&FormFieldOption::new("youth-ministry", "Youth Ministry")));

    let call = executor.last_call().await.unwrap();
    assert_eq!(call.action.handler, "lookups.quickCreate");
    assert_eq!(call.action.config["lookupId"], "ministries");
    assert_eq!(
        call.request.input,
        json!({ "lookupId": "ministries", "name": "Youth Ministry", "code": "youth-ministry" })
    );
    assert_eq!(call.request.context.form_id, "group-form");
}

#[tokio::test]
async fn test_response_option_wins_over_fallback() {
    let executor = Arc::new(MockExecutor::new("mock").with_response(
        "lookups.quickCreate",
        ActionResponse::ok(json!({ "option": { "value": "min-42", "label": "Youth" } })),
    ));
    let mut form = FormController::new(group_schema(), json!({}))
        .unwrap()
        .with_executor(executor);

    form.open_quick_create("ministry").unwrap();
    form.set_quick_create_name("Youth Ministry").unwrap();
    form.set_quick_create_code("ym").unwrap();
    form.submit_quick_create().await.unwrap();

    assert_eq!(form.value("ministry"), Some(&json!("min-42")));
    let options = form.options("ministry");
    assert_eq!(options.last(), Some(&FormFieldOption::new("min-42", "Youth")));
}

#[tokio::test]
async fn test_multi_select_appends_created_value() {
    let executor = Arc::new(MockExecutor::new("mock"));
    let mut form = FormController::new(group_schema(), json!({ "tags": ["music"] }))
        .unwrap()
        .with_executor(executor);

    form.open_quick_create("tags").unwrap();
    form.set_quick_create_name("Outreach").unwrap();
    form.submit_quick_create().await.unwrap();

    assert_eq!(form.value("tags"), Some(&json!(["music", "outreach"])));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failure_keeps_sub_form_open_and_allows_retry() {
    let executor = Arc::new(
        MockExecutor::new("mock")
            .with_error(
                "lookups.quickCreate",
                ActionError::NetworkError("connection reset".to_string()),
            )
            .with_response("lookups.quickCreate", ActionResponse::ok(json!({}))),
    );
    let mut form = FormController::new(group_schema(), json!({}))
        .unwrap()
        .with_executor(executor.clone());

    let writes = Arc::new(std::sync::Mutex::new(0));
    let counter = Arc::clone(&writes);
    form.subscribe(Topic::field("ministry"), move |_| *counter.lock().unwrap() += 1);

    form.open_quick_create("ministry").unwrap();
    form.set_quick_create_name("Youth Ministry").unwrap();

    let result = form.submit_quick_create().await;
    assert!(matches!(result, Err(FormError::Action(_))));
    let session = form.quick_create().unwrap();
    assert!(session.error().unwrap().contains("connection reset"));
    assert!(!session.is_submitting());
    assert!(form.value("ministry").is_none());
    assert_eq!(*writes.lock().unwrap(), 0);

    form.submit_quick_create().await.unwrap();
    assert_eq!(form.value("ministry"), Some(&json!("youth-ministry")));
    assert_eq!(*writes.lock().unwrap(), 1);
    assert_eq!(executor.call_count(), 2);
}

#[tokio::test]
async fn test_blank_name_never_reaches_executor() {
    let executor = Arc::new(MockExecutor::new("mock"));
    let mut form = FormController::new(group_schema(), json!({}))
        .unwrap()
        .with_executor(executor.clone());

    form.open_quick_create("ministry").unwrap();
    let result = form.submit_quick_create().await;

    assert!(matches!(result, Err(FormError::InvalidInput(_))));
    assert_eq!(executor.call_count(), 0);
    assert!(form.quick_create().is_some());
}

#[tokio::test]
async fn test_learned_options_survive_reset() {
    let executor = Arc::new(MockExecutor::new("mock"));
    let mut form = FormController::new(group_schema(), json!({}))
        .unwrap()
        .with_executor(executor);

    form.open_quick_create("ministry").unwrap();
    form.set_quick_create_name("Outreach").unwrap();
    form.submit_quick_create().await.unwrap();

    form.reset();
    assert!(form.value("ministry").is_none());
    assert_eq!(form.options("ministry").len(), 2);
}

#[test]
fn test_cancel_closes_sub_form() {
    let mut form = FormController::new(group_schema(), json!({})).unwrap();
    form.open_quick_create("ministry").unwrap();
    tokio_test::assert_ok!(form.cancel_quick_create());
    assert!(form.quick_create().is_none());
    assert!(matches!(form.cancel_quick_create(), Err(FormError::NoQuickCreate)));
}

//! Trigger interface: request in, one terminal reply out.

mod common;

use common::{build, now, order};
use recon_core::{
    store::TradeType,
    trigger::{handle_at, ScanRequest, TriggerResponse},
};

fn request(scope: Option<&[&str]>, actor: Option<&str>) -> ScanRequest {
    ScanRequest {
        scope: scope.map(|s| s.iter().map(|t| t.to_string()).collect()),
        triggered_by: actor.map(str::to_string),
    }
}

#[test]
fn successful_scan_replies_200_with_summary() {
    let engine = build();
    engine
        .store
        .insert_terminal_order(&order("123", TradeType::Buy, "5000"))
        .unwrap();

    let reply = handle_at(&engine, &request(Some(&["orders"]), Some("ops@desk")), now());
    assert_eq!(reply.status, 200);
    assert!(reply.is_success());
    let TriggerResponse::Completed(summary) = &reply.body else {
        panic!("expected a summary, got {:?}", reply.body);
    };
    assert_eq!(summary.findings_count, 1);
    assert_eq!(summary.critical_count, 1);

    let run = engine.store.get_scan(&summary.scan_id).unwrap().unwrap();
    assert_eq!(run.triggered_by, "ops@desk");
    assert_eq!(run.scope, vec!["orders"]);
}

#[test]
fn missing_actor_and_scope_fall_back_to_defaults() {
    let engine = build();
    let reply = handle_at(&engine, &request(None, Some("   ")), now());
    let TriggerResponse::Completed(summary) = &reply.body else {
        panic!("expected a summary, got {:?}", reply.body);
    };
    let run = engine.store.get_scan(&summary.scan_id).unwrap().unwrap();
    assert_eq!(run.triggered_by, "system");
    assert_eq!(run.scope, vec!["all"]);
}

#[test]
fn disabled_engine_replies_403() {
    let engine = build();
    engine
        .store
        .set_setting(&engine.config().feature_flag_key, "off", 0)
        .unwrap();

    let reply = handle_at(&engine, &ScanRequest::default(), now());
    assert_eq!(reply.status, 403);
    let TriggerResponse::Failed { error } = &reply.body else {
        panic!("expected an error, got {:?}", reply.body);
    };
    assert!(error.contains("disabled"), "{error}");
    assert_eq!(engine.store.scan_count().unwrap(), 0);
}

#[test]
fn unknown_scope_tag_replies_400_before_any_scan() {
    let engine = build();
    let reply = handle_at(&engine, &request(Some(&["orders", "lunch"]), None), now());
    assert_eq!(reply.status, 400);
    assert_eq!(engine.store.scan_count().unwrap(), 0);
}

#[test]
fn reply_serializes_as_flat_json() {
    let engine = build();
    let reply = handle_at(&engine, &ScanRequest::default(), now());
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["status"], 200);
    assert_eq!(json["body"]["findings_count"], 0);
    assert!(json["body"]["ai_summary"].is_string());
    assert!(json["body"]["scan_id"].is_string());
}

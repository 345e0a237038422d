//! Dice history service tests against a mocked backend

use std::sync::{Arc, Mutex};

use mockall::predicate::eq;
use serde_json::{json, Value};

use crate::bridge::rpc::{NoticeKind, NoticeSink, RpcError};
use crate::core::dice::DiceRoller;
use crate::core::dice_history::DiceHistoryService;
use crate::tests::mocks::MockRpcBridge;

#[derive(Default)]
struct RecordingNotices {
    notices: Mutex<Vec<(NoticeKind, String)>>,
}

impl NoticeSink for RecordingNotices {
    fn notify(&self, kind: NoticeKind, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((kind, message.to_string()));
        }
    }
}

impl RecordingNotices {
    fn take(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().map(|mut n| std::mem::take(&mut *n)).unwrap_or_default()
    }
}

fn stored_roll(id: &str, rolled_at: &str) -> Value {
    json!({
        "id": id,
        "campaign_id": "camp-7",
        "notation": "1d20+5",
        "dice_data": r##"[{"sides":20,"value":14,"color":"#8b5cf6"}]"##,
        "modifier": 5,
        "total": 19,
        "is_crit": false,
        "is_fumble": false,
        "shared_with_players": true,
        "rolled_at": rolled_at
    })
}

fn command_failure(command: &str) -> RpcError {
    RpcError::Command {
        command: command.to_string(),
        message: "database is locked".to_string(),
    }
}

#[tokio::test]
async fn test_save_sends_camel_case_args() {
    let result = DiceRoller::seeded(11).roll_notation("1d20+5").unwrap();
    let expected_total = result.total;

    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .withf(move |command, args| {
            command == "save_dice_roll"
                && args["campaignId"] == "camp-7"
                && args["notation"] == "1d20+5"
                && args["modifier"] == 5
                && args["total"] == expected_total
                && args["sharedWithPlayers"] == true
                && args["diceData"].as_str().is_some_and(|d| d.contains("\"sides\":20"))
        })
        .times(1)
        .returning(|_, _| Ok(stored_roll("roll-1", "2026-10-17 20:15:00")));

    let service = DiceHistoryService::new(Arc::new(rpc));
    let saved = service.save("camp-7", &result, true).await.unwrap();

    assert_eq!(saved.id, "roll-1");
    assert_eq!(saved.dice().unwrap()[0].value, 14);
    assert_eq!(saved.dice().unwrap()[0].color.as_deref(), Some("#8b5cf6"));
}

#[tokio::test]
async fn test_save_failure_returns_none_and_notifies() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .returning(|command, _| Err(command_failure(command)));

    let notices = Arc::new(RecordingNotices::default());
    let service = DiceHistoryService::new(Arc::new(rpc)).with_notices(notices.clone());
    let result = DiceRoller::seeded(3).roll_notation("2d6").unwrap();

    assert!(service.save("camp-7", &result, false).await.is_none());
    assert_eq!(
        notices.take(),
        vec![(NoticeKind::Error, "Failed to save dice roll".to_string())]
    );
}

#[tokio::test]
async fn test_recent_passes_limit() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .with(eq("get_dice_rolls"), eq(json!({ "campaignId": "camp-7", "limit": 20 })))
        .times(1)
        .returning(|_, _| {
            Ok(json!([
                stored_roll("roll-2", "2026-10-17 21:00:00"),
                stored_roll("roll-1", "2026-10-17 20:15:00"),
            ]))
        });

    let service = DiceHistoryService::new(Arc::new(rpc));
    let rolls = service.recent("camp-7", Some(20)).await;

    let ids: Vec<_> = rolls.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["roll-2", "roll-1"]);
}

#[tokio::test]
async fn test_recent_without_limit_sends_null() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .with(eq("get_dice_rolls"), eq(json!({ "campaignId": "camp-7", "limit": null })))
        .times(1)
        .returning(|_, _| Ok(json!([])));

    let service = DiceHistoryService::new(Arc::new(rpc));
    assert!(service.recent("camp-7", None).await.is_empty());
}

#[tokio::test]
async fn test_recent_failure_is_empty() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .returning(|command, _| Err(command_failure(command)));

    let notices = Arc::new(RecordingNotices::default());
    let service = DiceHistoryService::new(Arc::new(rpc)).with_notices(notices.clone());

    assert!(service.recent("camp-7", Some(5)).await.is_empty());
    assert!(service.recent_by_date("camp-7", Some(5)).await.is_empty());
    assert_eq!(notices.take().len(), 2);
}

#[tokio::test]
async fn test_malformed_response_is_empty() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .returning(|_, _| Ok(json!({ "unexpected": true })));

    let service = DiceHistoryService::new(Arc::new(rpc));
    assert!(service.recent("camp-7", None).await.is_empty());
}

#[tokio::test]
async fn test_recent_by_date_decodes_groups() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .with(eq("get_dice_rolls_by_date"), eq(json!({ "campaignId": "camp-7", "limit": 50 })))
        .returning(|_, _| {
            Ok(json!([
                { "date": "2026-10-17", "rolls": [stored_roll("roll-2", "2026-10-17 21:00:00")] },
                { "date": "2026-10-10", "rolls": [stored_roll("roll-1", "2026-10-10 19:30:00")] },
            ]))
        });

    let service = DiceHistoryService::new(Arc::new(rpc));
    let groups = service.recent_by_date("camp-7", Some(50)).await;

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].date, "2026-10-17");
    assert_eq!(groups[1].rolls[0].rolled_on(), "2026-10-10");
}

#[tokio::test]
async fn test_delete_and_clear_report_success() {
    let mut rpc = MockRpcBridge::new();
    rpc.expect_call()
        .with(eq("delete_dice_roll"), eq(json!({ "id": "roll-1" })))
        .times(1)
        .returning(|_, _| Ok(Value::Null));
    rpc.expect_call()
        .with(eq("clear_dice_history"), eq(json!({ "campaignId": "camp-7" })))
        .times(1)
        .returning(|command, _| Err(command_failure(command)));

    let notices = Arc::new(RecordingNotices::default());
    let service = DiceHistoryService::new(Arc::new(rpc)).with_notices(notices.clone());

    assert!(service.delete("roll-1").await);
    assert!(!service.clear("camp-7").await);
    assert_eq!(
        notices.take(),
        vec![(NoticeKind::Error, "Failed to clear dice history".to_string())]
    );
}

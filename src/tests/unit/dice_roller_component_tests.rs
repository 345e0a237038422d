//! Dice roller component tests
//!
//! The component is hosted with its bundled assets and driven from a
//! `LocalSet` (validation messages hide on a timer).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::bridge::fetch::EmbeddedFetcher;
use crate::components::dice_roller::{
    DiceRollerComponent, DICE_ROLLED_EVENT, DROP_ZONE, HISTORY_LIST, ROLL_INPUT, VALIDATION_MESSAGE,
};
use crate::config::DashboardConfig;
use crate::core::dice::{DiceRoller, RollKind};
use crate::runtime::cache::MemoryResourceCache;
use crate::runtime::component::{ComponentHost, ComponentRuntime};
use crate::runtime::error::ComponentError;
use crate::runtime::events::EventTarget;

fn test_config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.dice.seed = Some(42);
    config.ui.validation_message_ms = 40;
    config
}

fn roller_host(component: DiceRollerComponent) -> ComponentHost<DiceRollerComponent> {
    let base = Url::parse("app://localhost/").unwrap();
    let fetcher = EmbeddedFetcher::new();
    DiceRollerComponent::register_assets(&fetcher, &base).unwrap();
    let runtime = ComponentRuntime::new(base, Rc::new(MemoryResourceCache::new()), Arc::new(fetcher));
    ComponentHost::new(runtime, component)
}

fn history_notations(host: &ComponentHost<DiceRollerComponent>) -> Vec<String> {
    let ctx = host.context();
    let shadow = ctx.shadow();
    ctx.query_all(".history-item .roll-notation")
        .into_iter()
        .map(|node| shadow.text_content(node))
        .collect()
}

async fn in_local_set<F: std::future::Future<Output = ()>>(test: F) {
    tokio::task::LocalSet::new().run_until(test).await;
}

#[tokio::test]
async fn test_setup_renders_empty_history() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();

        assert!(host.is_ready());
        assert_eq!(
            host.text_of(".empty-history").as_deref(),
            Some("No rolls yet. Click a die or enter a roll notation.")
        );
        assert!(host.query(HISTORY_LIST).is_some());
    })
    .await;
}

#[tokio::test]
async fn test_setup_requires_history_list() {
    let base = Url::parse("app://localhost/").unwrap();
    let module = base.join("components/features/dice/roller/").unwrap();
    let fetcher = EmbeddedFetcher::new()
        .with_asset(&module.join("styles.css").unwrap(), "")
        .with_asset(&module.join("template.html").unwrap(), "<div class=\"drop-zone\"></div>");
    let runtime = ComponentRuntime::new(base, Rc::new(MemoryResourceCache::new()), Arc::new(fetcher));
    let host = ComponentHost::new(runtime, DiceRollerComponent::new());

    let err = host.connect().await.unwrap_err();
    assert_eq!(
        err,
        ComponentError::MissingElement {
            tag: "dice-roller",
            selector: HISTORY_LIST,
        }
    );
    assert!(!host.is_ready());
}

#[tokio::test]
async fn test_roll_records_renders_and_emits() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        let page = EventTarget::new("page");
        let emitted = Rc::new(RefCell::new(Vec::<Value>::new()));
        let e = Rc::clone(&emitted);
        page.add_event_listener(DICE_ROLLED_EVENT, move |event| {
            e.borrow_mut().push(event.detail.clone());
        });
        host.attach_within(&page);
        host.connect().await.unwrap();

        let result = host
            .with_component_mut(|roller, ctx| roller.roll(ctx, "2d6+3"))
            .flatten()
            .unwrap();

        assert_eq!(result.notation, "2d6+3");
        assert_eq!(history_notations(&host), vec!["2d6+3".to_string()]);
        assert_eq!(host.text_of(".history-item.latest .roll-result"), Some(result.total.to_string()));
        assert_eq!(host.text_of(".roll-breakdown"), Some(result.breakdown()));
        assert!(host.query(".empty-history").is_none());

        let emitted = emitted.borrow();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0]["notation"], "2d6+3");
        assert_eq!(emitted[0]["total"], result.total);
    })
    .await;
}

#[tokio::test]
async fn test_history_is_newest_first() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();

        host.with_component_mut(|roller, ctx| {
            roller.roll(ctx, "1d4");
            roller.roll_die(ctx, 8);
            roller.roll(ctx, " 3d6 ");
        })
        .unwrap();

        assert_eq!(history_notations(&host), vec!["3d6", "1d8", "1d4"]);
        assert_eq!(host.context().query_all(".history-item.latest").len(), 1);
        assert_eq!(host.with_component(|roller| roller.history().len()), Some(3));
    })
    .await;
}

#[tokio::test]
async fn test_invalid_notation_shows_validation_then_hides() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();

        let result = host.with_component_mut(|roller, ctx| roller.roll(ctx, "<b>2x6</b>")).unwrap();
        assert!(result.is_none());

        let ctx = host.context();
        let message = ctx.query(VALIDATION_MESSAGE).unwrap();
        assert!(ctx.shadow().has_class(message, "visible"));
        let text = ctx.shadow().text_content(message);
        assert!(text.starts_with("Invalid roll \"<b>2x6</b>\""), "unexpected message: {text}");
        assert!(ctx.query("b").is_none());
        assert_eq!(host.with_component(|roller| roller.history().is_empty()), Some(true));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!ctx.shadow().has_class(message, "visible"));
        assert_eq!(ctx.shadow().text_content(message), "");
    })
    .await;
}

#[tokio::test]
async fn test_valid_roll_hides_validation() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();

        host.with_component_mut(|roller, ctx| {
            roller.roll(ctx, "d");
            roller.roll(ctx, "1d20");
        })
        .unwrap();

        let ctx = host.context();
        let message = ctx.query(VALIDATION_MESSAGE).unwrap();
        assert!(!ctx.shadow().has_class(message, "visible"));
        assert_eq!(history_notations(&host), vec!["1d20"]);
    })
    .await;
}

#[tokio::test]
async fn test_roll_from_input() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();
        let input = host.query(ROLL_INPUT).unwrap();

        assert!(host.with_component_mut(|roller, ctx| roller.roll_from_input(ctx)).unwrap().is_none());

        host.context().shadow_mut().set_attr(input, "value", "4d10-2");
        let result = host
            .with_component_mut(|roller, ctx| roller.roll_from_input(ctx))
            .flatten()
            .unwrap();
        assert_eq!(result.kind, RollKind::Notation { count: 4, sides: 10 });
        assert_eq!(result.modifier, -2);
    })
    .await;
}

#[tokio::test]
async fn test_critical_roll_is_marked() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::with_roller(DiceRoller::seeded(7)));
        host.connect().await.unwrap();

        let crit = host.with_component_mut(|roller, ctx| {
            (0..1000).find_map(|_| roller.roll(ctx, "1d20").filter(|r| r.is_critical))
        })
        .unwrap();

        assert!(crit.is_some());
        assert!(host.query(".history-item.latest .roll-result.crit").is_some());
        assert_eq!(host.text_of(".history-item.latest .roll-result").as_deref(), Some("20"));
    })
    .await;
}

#[tokio::test]
async fn test_drop_zone_pool() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()));
        host.connect().await.unwrap();
        let ctx = host.context().clone();
        let zone = ctx.query(DROP_ZONE).unwrap();

        host.with_component_mut(|roller, ctx| {
            roller.add_to_drop_zone(ctx, 20);
            roller.add_to_drop_zone(ctx, 6);
            roller.add_to_drop_zone(ctx, 100);
        })
        .unwrap();
        assert_eq!(ctx.query_all(".dropped-die").len(), 3);
        assert!(ctx.shadow().has_class(zone, "has-dice"));
        assert_eq!(host.text_of(".dropped-die.d100 .die-label").as_deref(), Some("%"));
        let d20 = ctx.query(".dropped-die.d20").unwrap();
        assert_eq!(ctx.shadow().attr(d20, "style"), Some("background: #9b59b6"));

        let removed = host.with_component_mut(|roller, ctx| roller.remove_from_drop_zone(ctx, 1));
        assert_eq!(removed.flatten().map(|die| die.sides), Some(6));
        assert!(host.with_component_mut(|roller, ctx| roller.remove_from_drop_zone(ctx, 5)).unwrap().is_none());

        let result = host
            .with_component_mut(|roller, ctx| roller.roll_dropped(ctx))
            .flatten()
            .unwrap();
        assert_eq!(result.kind, RollKind::Multiset);
        let sides: Vec<u32> = result.dice.iter().map(|d| d.sides).collect();
        assert_eq!(sides, vec![20, 100]);
        assert_eq!(result.notation, "1d100 + 1d20");

        assert!(ctx.query_all(".dropped-die").is_empty());
        assert!(!ctx.shadow().has_class(zone, "has-dice"));
        assert_eq!(host.with_component(|roller| roller.dropped_dice().is_empty()), Some(true));
        assert!(ctx.query(".history-item[data-kind=multiset]").is_some());

        assert!(host.with_component_mut(|roller, ctx| roller.roll_dropped(ctx)).unwrap().is_none());
    })
    .await;
}

#[tokio::test]
async fn test_max_history_attribute() {
    in_local_set(async {
        let host = roller_host(DiceRollerComponent::from_config(&test_config()))
            .with_attribute("max-history", "2");
        host.connect().await.unwrap();

        host.with_component_mut(|roller, ctx| {
            for notation in ["1d4", "1d6", "1d8"] {
                roller.roll(ctx, notation);
            }
        })
        .unwrap();
        assert_eq!(history_notations(&host), vec!["1d8", "1d6"]);

        host.set_attribute("max-history", "1");
        assert_eq!(history_notations(&host), vec!["1d8"]);

        // unparseable values fall back to the configured limit
        host.set_attribute("max-history", "lots");
        assert_eq!(host.with_component(|roller| roller.history().limit()), Some(50));
    })
    .await;
}

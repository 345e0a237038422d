//! Dice Roller Component
//!
//! Dice bag with typed notation rolls, a drop zone for mixed pools and a
//! bounded roll history. Every roll is emitted as a `dice-rolled` event so
//! enclosing panels can persist or share it.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::bridge::fetch::EmbeddedFetcher;
use crate::config::DashboardConfig;
use crate::core::dice::{DiceRoller, DieSpec, RollKind, RollResult};
use crate::core::dice_history::{RollHistory, DEFAULT_HISTORY_LIMIT};
use crate::runtime::component::{Component, ComponentContext};
use crate::runtime::debounce::Debounced;
use crate::runtime::error::{ComponentError, ComponentResult};
use crate::runtime::markup::escape_html;

/// Event emitted after every successful roll; the detail is the `RollResult`
pub const DICE_ROLLED_EVENT: &str = "dice-rolled";

pub const HISTORY_LIST: &str = ".history-list";
pub const DROP_ZONE: &str = ".drop-zone";
pub const DROP_ZONE_DICE: &str = ".drop-zone-dice";
pub const VALIDATION_MESSAGE: &str = ".validation-message";
pub const ROLL_INPUT: &str = ".roll-input";

/// Bundled template
pub const TEMPLATE: &str = include_str!("../../assets/components/features/dice/roller/template.html");
/// Bundled stylesheet
pub const STYLES: &str = include_str!("../../assets/components/features/dice/roller/styles.css");

const EMPTY_HISTORY: &str = "No rolls yet. Click a die or enter a roll notation.";
const DEFAULT_VALIDATION_DURATION: Duration = Duration::from_secs(3);

pub struct DiceRollerComponent {
    roller: DiceRoller,
    history: RollHistory,
    default_limit: usize,
    dropped: Vec<DieSpec>,
    validation_duration: Duration,
    clear_validation: Option<Debounced<()>>,
}

impl Default for DiceRollerComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRollerComponent {
    pub fn new() -> Self {
        Self::with_roller(DiceRoller::new())
    }

    pub fn with_roller(roller: DiceRoller) -> Self {
        Self {
            roller,
            history: RollHistory::new(DEFAULT_HISTORY_LIMIT),
            default_limit: DEFAULT_HISTORY_LIMIT,
            dropped: Vec::new(),
            validation_duration: DEFAULT_VALIDATION_DURATION,
            clear_validation: None,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        let roller = match config.dice.seed {
            Some(seed) => DiceRoller::seeded(seed),
            None => DiceRoller::new(),
        };
        let mut component = Self::with_roller(roller);
        component.default_limit = config.dice.history_limit.max(1);
        component.history.set_limit(component.default_limit);
        component.validation_duration = config.ui.validation_message_duration();
        component
    }

    /// Register the bundled template and stylesheet under `base_url`
    pub fn register_assets(fetcher: &EmbeddedFetcher, base_url: &Url) -> Result<(), url::ParseError> {
        let module = base_url.join(<Self as Component>::MODULE)?;
        fetcher.insert(&module.join("styles.css")?, STYLES);
        fetcher.insert(&module.join("template.html")?, TEMPLATE);
        Ok(())
    }

    pub fn history(&self) -> &RollHistory {
        &self.history
    }

    pub fn dropped_dice(&self) -> &[DieSpec] {
        &self.dropped
    }

    // ========================================================================
    // Rolling
    // ========================================================================

    /// Roll typed notation such as `2d6+3`.
    ///
    /// Invalid notation shows a validation message and records nothing.
    pub fn roll(&mut self, ctx: &ComponentContext, notation: &str) -> Option<RollResult> {
        match self.roller.roll_notation(notation) {
            Ok(result) => {
                self.hide_validation(ctx);
                Some(self.record(ctx, result))
            }
            Err(e) => {
                log::warn!("Invalid dice notation {:?}: {}", notation, e);
                self.show_validation(ctx, &format!("Invalid roll \"{}\": {}", notation.trim(), e));
                None
            }
        }
    }

    /// Roll a single die of the given size (die button click)
    pub fn roll_die(&mut self, ctx: &ComponentContext, sides: u32) -> Option<RollResult> {
        self.roll(ctx, &format!("1d{}", sides))
    }

    /// Roll whatever is typed into the notation input
    pub fn roll_from_input(&mut self, ctx: &ComponentContext) -> Option<RollResult> {
        let input = ctx.query(ROLL_INPUT)?;
        let notation = ctx.shadow().attr(input, "value").unwrap_or_default().trim().to_string();
        if notation.is_empty() {
            return None;
        }
        self.roll(ctx, &notation)
    }

    // ========================================================================
    // Drop zone
    // ========================================================================

    pub fn add_to_drop_zone(&mut self, ctx: &ComponentContext, sides: u32) {
        self.dropped.push(DieSpec::standard(sides));
        self.render_drop_zone(ctx);
    }

    pub fn remove_from_drop_zone(&mut self, ctx: &ComponentContext, index: usize) -> Option<DieSpec> {
        if index >= self.dropped.len() {
            return None;
        }
        let removed = self.dropped.remove(index);
        self.render_drop_zone(ctx);
        Some(removed)
    }

    /// Roll the pooled dice and empty the drop zone; nothing happens when
    /// the zone is empty
    pub fn roll_dropped(&mut self, ctx: &ComponentContext) -> Option<RollResult> {
        if self.dropped.is_empty() {
            return None;
        }

        match self.roller.roll_multiset(&self.dropped) {
            Ok(result) => {
                self.dropped.clear();
                self.render_drop_zone(ctx);
                self.hide_validation(ctx);
                Some(self.record(ctx, result))
            }
            Err(e) => {
                log::warn!("Cannot roll drop zone: {}", e);
                self.show_validation(ctx, &e.to_string());
                None
            }
        }
    }

    fn record(&mut self, ctx: &ComponentContext, result: RollResult) -> RollResult {
        self.history.push(result.clone());
        self.render_history(ctx);

        match serde_json::to_value(&result) {
            Ok(detail) => {
                ctx.emit(DICE_ROLLED_EVENT, detail);
            }
            Err(e) => log::error!("Failed to encode roll {}: {}", result.notation, e),
        }
        result
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn render_history(&self, ctx: &ComponentContext) {
        let Some(list) = ctx.query(HISTORY_LIST) else {
            return;
        };

        let markup = if self.history.is_empty() {
            format!("<div class=\"empty-history\">{}</div>", EMPTY_HISTORY)
        } else {
            self.history
                .iter()
                .enumerate()
                .map(|(index, entry)| history_item(&entry.result, index == 0))
                .collect()
        };

        ctx.shadow_mut().set_inner_markup(list, &markup);
    }

    fn render_drop_zone(&self, ctx: &ComponentContext) {
        if let Some(zone) = ctx.query(DROP_ZONE) {
            ctx.shadow_mut().toggle_class(zone, "has-dice", !self.dropped.is_empty());
        }
        let Some(dice) = ctx.query(DROP_ZONE_DICE) else {
            return;
        };

        let markup: String = self
            .dropped
            .iter()
            .enumerate()
            .map(|(index, die)| dropped_die(index, die))
            .collect();
        ctx.shadow_mut().set_inner_markup(dice, &markup);
    }

    fn show_validation(&self, ctx: &ComponentContext, message: &str) {
        let Some(node) = ctx.query(VALIDATION_MESSAGE) else {
            return;
        };
        {
            let mut shadow = ctx.shadow_mut();
            shadow.set_text(node, message);
            shadow.toggle_class(node, "visible", true);
        }
        if let Some(clear) = &self.clear_validation {
            clear.call(());
        }
    }

    fn hide_validation(&self, ctx: &ComponentContext) {
        if let Some(clear) = &self.clear_validation {
            clear.cancel();
        }
        clear_validation_message(ctx);
    }
}

fn clear_validation_message(ctx: &ComponentContext) {
    if let Some(node) = ctx.query(VALIDATION_MESSAGE) {
        let mut shadow = ctx.shadow_mut();
        shadow.set_text(node, "");
        shadow.toggle_class(node, "visible", false);
    }
}

fn history_item(result: &RollResult, latest: bool) -> String {
    let breakdown = result.breakdown();
    let breakdown = if breakdown.is_empty() {
        String::new()
    } else {
        format!("<span class=\"roll-breakdown\">{}</span>", escape_html(&breakdown))
    };

    let mut result_class = String::from("roll-result");
    if result.is_critical {
        result_class.push_str(" crit");
    }
    if result.is_fumble {
        result_class.push_str(" fumble");
    }

    let kind = match result.kind {
        RollKind::Notation { .. } => "notation",
        RollKind::Multiset => "multiset",
    };

    format!(
        "<div class=\"history-item{latest}\" data-kind=\"{kind}\"><div><span class=\"roll-notation\">{notation}</span>{breakdown}</div><span class=\"{result_class}\">{total}</span></div>",
        latest = if latest { " latest" } else { "" },
        notation = escape_html(&result.notation),
        total = result.total,
    )
}

fn dropped_die(index: usize, die: &DieSpec) -> String {
    let label = if die.sides == 100 {
        "%".to_string()
    } else {
        die.sides.to_string()
    };
    let style = die
        .color
        .as_deref()
        .map(|color| format!(" style=\"background: {}\"", escape_html(color)))
        .unwrap_or_default();

    format!(
        "<div class=\"dropped-die d{sides}\" data-index=\"{index}\" data-sides=\"{sides}\"{style}><span class=\"die-label\">{label}</span></div>",
        sides = die.sides,
    )
}

#[async_trait(?Send)]
impl Component for DiceRollerComponent {
    const TAG: &'static str = "dice-roller";
    const MODULE: &'static str = "components/features/dice/roller/";
    const OBSERVED_ATTRIBUTES: &'static [&'static str] = &["max-history"];

    async fn setup(&mut self, ctx: &ComponentContext) -> ComponentResult<()> {
        for selector in [HISTORY_LIST, DROP_ZONE, DROP_ZONE_DICE, VALIDATION_MESSAGE] {
            if ctx.query(selector).is_none() {
                return Err(ComponentError::MissingElement {
                    tag: Self::TAG,
                    selector,
                });
            }
        }

        let limit = ctx.get_int("max-history", self.default_limit as i64);
        self.history.set_limit(limit.max(1) as usize);

        let weak = ctx.downgrade();
        self.clear_validation = Some(ctx.debounced(self.validation_duration, move |()| {
            if let Some(ctx) = weak.upgrade() {
                clear_validation_message(&ctx);
            }
        }));

        self.render_history(ctx);
        self.render_drop_zone(ctx);
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &ComponentContext) {
        self.clear_validation = None;
    }

    fn on_attribute_changed(
        &mut self,
        ctx: &ComponentContext,
        name: &str,
        _old_value: Option<&str>,
        _new_value: Option<&str>,
    ) {
        if name == "max-history" {
            let limit = ctx.get_int("max-history", self.default_limit as i64);
            self.history.set_limit(limit.max(1) as usize);
            self.render_history(ctx);
        }
    }
}

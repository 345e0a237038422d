//! Dice Roll History
//!
//! In-session history kept by the dice roller, plus the persisted roll log
//! stored by the backend per campaign.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::dice::{DieOutcome, RollResult};
use crate::bridge::rpc::{safe_invoke, safe_invoke_void, NoticeSink, RpcBridge, SafeInvokeOptions};

/// Entries kept by a [`RollHistory`] unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Backend event published after a roll has been persisted
pub const DICE_ROLL_SAVED_EVENT: &str = "dice-roll-saved";

// ============================================================================
// Session History
// ============================================================================

/// A roll as it appears in the session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub result: RollResult,
    pub rolled_at: DateTime<Utc>,
}

/// Bounded, newest-first roll history
#[derive(Debug, Clone)]
pub struct RollHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Default for RollHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl RollHistory {
    /// Create a history holding at most `limit` entries (at least one)
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the bound, dropping the oldest entries that no longer fit
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.entries.truncate(self.limit);
    }

    /// Record a roll as the newest entry
    pub fn push(&mut self, result: RollResult) -> &HistoryEntry {
        self.entries.push_front(HistoryEntry {
            result,
            rolled_at: Utc::now(),
        });
        self.entries.truncate(self.limit);
        &self.entries[0]
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Persisted Rolls
// ============================================================================

/// A roll persisted by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRollRecord {
    pub id: String,
    pub campaign_id: String,
    pub notation: String,
    /// JSON array of [`DieOutcome`]
    pub dice_data: String,
    pub modifier: i32,
    pub total: i32,
    pub is_crit: bool,
    pub is_fumble: bool,
    pub shared_with_players: bool,
    /// Backend timestamp, `YYYY-MM-DD HH:MM:SS`
    pub rolled_at: String,
}

impl DiceRollRecord {
    /// Decode the stored dice
    pub fn dice(&self) -> Result<Vec<DieOutcome>, serde_json::Error> {
        serde_json::from_str(&self.dice_data)
    }

    /// Date part of `rolled_at`
    pub fn rolled_on(&self) -> &str {
        self.rolled_at
            .split(|c| c == ' ' || c == 'T')
            .next()
            .unwrap_or(&self.rolled_at)
    }
}

/// Persisted rolls sharing a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRollsByDate {
    pub date: String,
    pub rolls: Vec<DiceRollRecord>,
}

/// Group records by date, most recent date first.
///
/// Records keep their relative order within a date.
pub fn group_by_date(records: Vec<DiceRollRecord>) -> Vec<DiceRollsByDate> {
    let mut grouped: BTreeMap<String, Vec<DiceRollRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.rolled_on().to_string()).or_default().push(record);
    }

    grouped
        .into_iter()
        .rev()
        .map(|(date, rolls)| DiceRollsByDate { date, rolls })
        .collect()
}

/// Arguments of the `save_dice_roll` command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDiceRollArgs {
    pub campaign_id: String,
    pub notation: String,
    pub dice_data: String,
    pub modifier: i32,
    pub total: i32,
    pub is_crit: bool,
    pub is_fumble: bool,
    pub shared_with_players: bool,
}

impl SaveDiceRollArgs {
    pub fn from_result(
        campaign_id: &str,
        result: &RollResult,
        shared_with_players: bool,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            campaign_id: campaign_id.to_string(),
            notation: result.notation.clone(),
            dice_data: serde_json::to_string(&result.dice)?,
            modifier: result.modifier,
            total: result.total.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            is_crit: result.is_critical,
            is_fumble: result.is_fumble,
            shared_with_players,
        })
    }
}

// ============================================================================
// History Service
// ============================================================================

/// Persists rolls through the backend.
///
/// Every operation recovers from RPC failure: the failure is logged (and
/// raised as a notice when a sink is attached) and an empty value returned.
pub struct DiceHistoryService {
    rpc: Arc<dyn RpcBridge>,
    notices: Option<Arc<dyn NoticeSink + Send + Sync>>,
}

impl DiceHistoryService {
    pub fn new(rpc: Arc<dyn RpcBridge>) -> Self {
        Self { rpc, notices: None }
    }

    pub fn with_notices(mut self, notices: Arc<dyn NoticeSink + Send + Sync>) -> Self {
        self.notices = Some(notices);
        self
    }

    fn options<'a>(&'a self, message: &'a str) -> SafeInvokeOptions<'a> {
        let options = SafeInvokeOptions::message(message);
        match &self.notices {
            Some(notices) => options.with_notices(notices.as_ref()),
            None => options,
        }
    }

    /// Persist a roll; returns the stored record
    pub async fn save(
        &self,
        campaign_id: &str,
        result: &RollResult,
        shared_with_players: bool,
    ) -> Option<DiceRollRecord> {
        let args = match SaveDiceRollArgs::from_result(campaign_id, result, shared_with_players) {
            Ok(args) => args,
            Err(e) => {
                log::error!("Failed to encode roll {}: {}", result.notation, e);
                return None;
            }
        };

        safe_invoke(
            self.rpc.as_ref(),
            "save_dice_roll",
            &args,
            self.options("Failed to save dice roll"),
        )
        .await
    }

    /// Most recent rolls of a campaign, newest first
    pub async fn recent(&self, campaign_id: &str, limit: Option<u32>) -> Vec<DiceRollRecord> {
        safe_invoke(
            self.rpc.as_ref(),
            "get_dice_rolls",
            &json!({ "campaignId": campaign_id, "limit": limit }),
            self.options("Failed to load dice history"),
        )
        .await
        .unwrap_or_default()
    }

    /// Most recent rolls of a campaign grouped by date
    pub async fn recent_by_date(&self, campaign_id: &str, limit: Option<u32>) -> Vec<DiceRollsByDate> {
        safe_invoke(
            self.rpc.as_ref(),
            "get_dice_rolls_by_date",
            &json!({ "campaignId": campaign_id, "limit": limit }),
            self.options("Failed to load dice history"),
        )
        .await
        .unwrap_or_default()
    }

    pub async fn delete(&self, id: &str) -> bool {
        safe_invoke_void(
            self.rpc.as_ref(),
            "delete_dice_roll",
            &json!({ "id": id }),
            self.options("Failed to delete dice roll"),
        )
        .await
    }

    /// Remove every persisted roll of a campaign
    pub async fn clear(&self, campaign_id: &str) -> bool {
        safe_invoke_void(
            self.rpc.as_ref(),
            "clear_dice_history",
            &json!({ "campaignId": campaign_id }),
            self.options("Failed to clear dice history"),
        )
        .await
    }
}

//! Row-level types for every entity in SPEC_FULL.md §3.
//!
//! These are the canonical Rust shapes for what is stored; the `db`
//! submodules are the only code that talks `sqlx` directly. Enums map to
//! `TEXT` columns with a `CHECK` constraint in the migrations, using sqlx's
//! derive for simple C-like enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RoundLifecycle {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SettlementStatus {
    NotSettled,
    Settling,
    Settled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SlipStatus {
    Pending,
    Won,
    Lost,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum LedgerDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum LedgerKind {
    Recharge,
    Withdrawal,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RefKind {
    BetPlacement,
    Settlement,
    Claim,
    CancelRefund,
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResultType {
    Auto,
    Manual,
}

impl std::str::FromStr for GameResultType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(GameResultType::Auto),
            "manual" => Ok(GameResultType::Manual),
            other => Err(anyhow::anyhow!("unknown game_result_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinningCardPolicy {
    LowestLoss,
    Random,
    Fixed,
}

impl std::str::FromStr for WinningCardPolicy {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lowest_loss" => Ok(WinningCardPolicy::LowestLoss),
            "random" => Ok(WinningCardPolicy::Random),
            "fixed" => Ok(WinningCardPolicy::Fixed),
            other => Err(anyhow::anyhow!("unknown winning_card_policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub deposit_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoundRow {
    pub round_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lifecycle_state: RoundLifecycle,
    pub settlement_status: SettlementStatus,
    pub winning_card: Option<i32>,
    pub payout_multiplier: Decimal,
    pub settlement_started_at: Option<DateTime<Utc>>,
    pub settlement_completed_at: Option<DateTime<Utc>>,
    pub settlement_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetSlipRow {
    pub slip_id: Uuid,
    pub user_id: Uuid,
    pub round_id: String,
    pub total_amount: Decimal,
    pub barcode: String,
    pub payout_amount: Decimal,
    pub status: SlipStatus,
    pub cancelled: bool,
    pub claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetDetailRow {
    pub id: i64,
    pub slip_id: Uuid,
    pub round_id: String,
    pub user_id: Uuid,
    pub card_number: i32,
    pub bet_amount: Decimal,
    pub is_winner: bool,
    pub payout: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoundCardTotalRow {
    pub round_id: String,
    pub card_number: i32,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEntryRow {
    pub id: i64,
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub kind: LedgerKind,
    pub amount: Decimal,
    pub direction: LedgerDirection,
    pub round_id: Option<String>,
    pub ref_kind: RefKind,
    pub ref_id: String,
    pub status: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

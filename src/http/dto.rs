//! Request/response shapes for the HTTP surface (spec.md §6). Kept
//! separate from the `db` row structs so storage layout can change
//! without touching the wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::model::{BetDetailRow, BetSlipRow, RoundRow};
use crate::money::Money;
use crate::settlement::{CardPreview, SettlementReport};

#[derive(Debug, Deserialize)]
pub struct BetLineRequest {
    pub card_number: i32,
    pub bet_amount: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub round_id: String,
    pub lines: Vec<BetLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub slip_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub amount: String,
    pub new_balance: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub refunded_amount: String,
}

#[derive(Debug, Serialize)]
pub struct BetDetailDto {
    pub card_number: i32,
    pub bet_amount: String,
    pub is_winner: bool,
    pub payout: String,
}

impl From<&BetDetailRow> for BetDetailDto {
    fn from(row: &BetDetailRow) -> Self {
        Self {
            card_number: row.card_number,
            bet_amount: row.bet_amount.to_string(),
            is_winner: row.is_winner,
            payout: row.payout.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlipDto {
    pub slip_id: Uuid,
    pub round_id: String,
    pub barcode: String,
    pub total_amount: String,
    pub payout_amount: String,
    pub status: String,
    pub cancelled: bool,
    pub claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<BetDetailDto>,
}

impl SlipDto {
    pub fn new(slip: &BetSlipRow, details: &[BetDetailRow]) -> Self {
        Self {
            slip_id: slip.slip_id,
            round_id: slip.round_id.clone(),
            barcode: slip.barcode.clone(),
            total_amount: slip.total_amount.to_string(),
            payout_amount: slip.payout_amount.to_string(),
            status: format!("{:?}", slip.status).to_ascii_lowercase(),
            cancelled: slip.cancelled,
            claimed: slip.claimed,
            claimed_at: slip.claimed_at,
            created_at: slip.created_at,
            lines: details.iter().map(BetDetailDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoundDto {
    pub round_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lifecycle_state: String,
    pub settlement_status: String,
    pub winning_card: Option<i32>,
    pub payout_multiplier: String,
}

impl From<&RoundRow> for RoundDto {
    fn from(row: &RoundRow) -> Self {
        Self {
            round_id: row.round_id.clone(),
            start_time: row.start_time,
            end_time: row.end_time,
            lifecycle_state: format!("{:?}", row.lifecycle_state).to_ascii_lowercase(),
            settlement_status: format!("{:?}", row.settlement_status).to_ascii_lowercase(),
            winning_card: row.winning_card,
            payout_multiplier: row.payout_multiplier.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletSummaryResponse {
    pub balance: String,
    pub entries: Vec<LedgerEntryDto>,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryDto {
    pub entry_id: Uuid,
    pub kind: String,
    pub amount: String,
    pub direction: String,
    pub round_id: Option<String>,
    pub ref_kind: String,
    pub ref_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&crate::db::model::LedgerEntryRow> for LedgerEntryDto {
    fn from(row: &crate::db::model::LedgerEntryRow) -> Self {
        Self {
            entry_id: row.entry_id,
            kind: format!("{:?}", row.kind).to_ascii_lowercase(),
            amount: row.amount.to_string(),
            direction: format!("{:?}", row.direction).to_ascii_lowercase(),
            round_id: row.round_id.clone(),
            ref_kind: format!("{:?}", row.ref_kind).to_ascii_lowercase(),
            ref_id: row.ref_id.clone(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettlementReportDto {
    pub round_id: String,
    pub winning_card: i32,
    pub winning_slip_count: u64,
    pub losing_slip_count: u64,
    pub total_payout: String,
    pub house_profit: String,
}

impl From<&SettlementReport> for SettlementReportDto {
    fn from(r: &SettlementReport) -> Self {
        Self {
            round_id: r.round_id.clone(),
            winning_card: r.winning_card,
            winning_slip_count: r.winning_slip_count,
            losing_slip_count: r.losing_slip_count,
            total_payout: r.total_payout.to_string(),
            house_profit: r.house_profit.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub winning_card: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CardPreviewDto {
    pub card_number: i32,
    pub total_wagered_on_card: String,
    pub expected_payout: String,
    pub house_profit: String,
}

impl From<&CardPreview> for CardPreviewDto {
    fn from(p: &CardPreview) -> Self {
        Self {
            card_number: p.card_number,
            total_wagered_on_card: p.total_wagered_on_card.to_string(),
            expected_payout: p.expected_payout.to_string(),
            house_profit: p.house_profit.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertSettingRequest {
    pub key: String,
    pub value: String,
}

pub fn parse_money(raw: &str) -> Result<Money, crate::errors::AppError> {
    Money::parse(raw)
        .map_err(|_| crate::errors::AppError::Validation(format!("'{raw}' is not a valid amount")))
}

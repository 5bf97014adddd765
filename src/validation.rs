//! Input validation for the wagering engine: bounds/shape checks for card
//! numbers, bet amounts, identifiers, and settings values
//! (SPEC_FULL.md §2, module 16).

use crate::errors::{AppError, AppResult};
use crate::money::Money;

/// A single requested `(card_number, amount)` line from `POST /bets/place`,
/// before it has been checked against `card_count`/`max_bet_amount`.
#[derive(Debug, Clone)]
pub struct RawBetLine {
    pub card_number: i32,
    pub amount: Money,
}

pub fn validate_card_number(card_number: i32, card_count: i32) -> AppResult<()> {
    if !(1..=card_count).contains(&card_number) {
        return Err(AppError::Validation(format!(
            "card_number {card_number} out of range [1,{card_count}]"
        )));
    }
    Ok(())
}

pub fn validate_bet_amount(amount: Money, max_bet_amount: Option<Money>) -> AppResult<()> {
    if !amount.is_positive() {
        return Err(AppError::Validation(
            "bet amount must be strictly positive".to_string(),
        ));
    }
    if let Some(max) = max_bet_amount {
        if amount > max {
            return Err(AppError::Validation(format!(
                "bet amount {amount} exceeds max_bet_amount {max}"
            )));
        }
    }
    Ok(())
}

/// Validates a full bet-placement request: at least one line, every line
/// individually valid, and a positive total (spec.md §4.5 preconditions).
pub fn validate_bet_lines(
    lines: &[RawBetLine],
    card_count: i32,
    max_bet_amount: Option<Money>,
) -> AppResult<Money> {
    if lines.is_empty() {
        return Err(AppError::Validation(
            "at least one bet line is required".to_string(),
        ));
    }
    let mut total = Money::ZERO;
    for line in lines {
        validate_card_number(line.card_number, card_count)?;
        validate_bet_amount(line.amount, max_bet_amount)?;
        total = total
            .checked_add(line.amount)
            .ok_or_else(|| AppError::Validation("bet total overflowed".to_string()))?;
    }
    if !total.is_positive() {
        return Err(AppError::Validation(
            "total bet amount must be positive".to_string(),
        ));
    }
    Ok(total)
}

/// A slip lookup identifier is either a UUID (slip id) or an opaque
/// barcode string. This only checks shape, not existence.
#[derive(Debug, Clone)]
pub enum SlipIdentifier {
    SlipId(uuid::Uuid),
    Barcode(String),
}

pub fn parse_slip_identifier(raw: &str) -> AppResult<SlipIdentifier> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("identifier must not be empty".to_string()));
    }
    if let Ok(id) = uuid::Uuid::parse_str(trimmed) {
        return Ok(SlipIdentifier::SlipId(id));
    }
    if trimmed.len() > 64 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::Validation(
            "barcode must be alphanumeric/hyphen, max 64 chars".to_string(),
        ));
    }
    Ok(SlipIdentifier::Barcode(trimmed.to_string()))
}

/// Validates a raw `HH:MM` operating-window bound before it is written to
/// the settings table by `PATCH /admin/settings`.
pub fn validate_hhmm(raw: &str) -> AppResult<()> {
    chrono::NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("'{raw}' is not a valid HH:MM time")))
}

pub fn validate_card_count(card_count: i32) -> AppResult<()> {
    if !(2..=99).contains(&card_count) {
        return Err(AppError::Validation(
            "card_count must be between 2 and 99".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_round_duration_seconds(seconds: i64) -> AppResult<()> {
    if !(10..=86_400).contains(&seconds) {
        return Err(AppError::Validation(
            "round_duration_seconds must be between 10 and 86400".to_string(),
        ));
    }
    Ok(())
}

/// Truncates/escapes a string before it is embedded in an error's `details`
/// field, so user-supplied identifiers never reach a client response
/// un-sanitized (spec.md §7's propagation policy).
pub fn sanitize_for_error_details(raw: &str) -> String {
    const MAX_LEN: usize = 128;
    let truncated: String = raw.chars().take(MAX_LEN).collect();
    truncated
        .chars()
        .map(|c| if c.is_control() { '\u{FFFD}' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_card_number_out_of_range() {
        assert!(validate_card_number(0, 12).is_err());
        assert!(validate_card_number(13, 12).is_err());
        assert!(validate_card_number(1, 12).is_ok());
        assert!(validate_card_number(12, 12).is_ok());
    }

    #[test]
    fn rejects_non_positive_bet_amount() {
        assert!(validate_bet_amount(Money::ZERO, None).is_err());
    }

    #[test]
    fn enforces_max_bet_amount_when_configured() {
        let max = Money::parse("50.00").unwrap();
        assert!(validate_bet_amount(Money::parse("50.00").unwrap(), Some(max)).is_ok());
        assert!(validate_bet_amount(Money::parse("50.01").unwrap(), Some(max)).is_err());
    }

    #[test]
    fn requires_at_least_one_line() {
        assert!(validate_bet_lines(&[], 12, None).is_err());
    }

    #[test]
    fn sums_valid_lines_into_total() {
        let lines = vec![
            RawBetLine { card_number: 1, amount: Money::parse("10.00").unwrap() },
            RawBetLine { card_number: 2, amount: Money::parse("5.50").unwrap() },
        ];
        let total = validate_bet_lines(&lines, 12, None).unwrap();
        assert_eq!(total.to_string(), "15.50");
    }

    #[test]
    fn parses_uuid_identifier() {
        let id = uuid::Uuid::new_v4();
        match parse_slip_identifier(&id.to_string()).unwrap() {
            SlipIdentifier::SlipId(parsed) => assert_eq!(parsed, id),
            SlipIdentifier::Barcode(_) => panic!("expected SlipId"),
        }
    }

    #[test]
    fn parses_barcode_identifier() {
        match parse_slip_identifier("RND-20260101-AB12").unwrap() {
            SlipIdentifier::Barcode(b) => assert_eq!(b, "RND-20260101-AB12"),
            SlipIdentifier::SlipId(_) => panic!("expected Barcode"),
        }
    }

    #[test]
    fn rejects_malformed_barcode() {
        assert!(parse_slip_identifier("").is_err());
        assert!(parse_slip_identifier("has spaces").is_err());
    }

    #[test]
    fn validates_operating_window_bounds() {
        assert!(validate_hhmm("09:00").is_ok());
        assert!(validate_hhmm("25:00").is_err());
        assert!(validate_hhmm("not-a-time").is_err());
    }

    #[test]
    fn sanitizes_control_characters_out_of_details() {
        let raw = "bad\nid\x07";
        let sanitized = sanitize_for_error_details(raw);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\u{7}'));
    }
}

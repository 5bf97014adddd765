//! Winning-Card Selector (spec.md §4.3): a pure function with no I/O.
//!
//! Given per-card bet totals and a payout multiplier, chooses the round's
//! winning card according to a configurable policy. Deterministic for
//! given inputs, except `random`.

use std::collections::BTreeMap;

use rand::Rng;
use rust_decimal::Decimal;

use crate::db::model::WinningCardPolicy;
use crate::money::Money;

/// Per-card bet totals, keyed by card number. A `BTreeMap` keeps
/// iteration in card-number order, which matters for the lowest-card
/// tie-break rule.
pub type CardTotals = BTreeMap<i32, Money>;

pub struct SelectionInput<'a> {
    pub bets: &'a CardTotals,
    pub card_count: i32,
    pub multiplier: Decimal,
    pub policy: WinningCardPolicy,
    /// Only consulted for [`WinningCardPolicy::Fixed`].
    pub fixed_winning_card: Option<i32>,
}

/// Selects the winning card. `lowest_loss` and `fixed` are deterministic;
/// `random` draws uniformly from `[1..card_count]`.
pub fn select_winning_card(input: &SelectionInput<'_>) -> i32 {
    match input.policy {
        WinningCardPolicy::Fixed => {
            match input.fixed_winning_card {
                Some(card) if (1..=input.card_count).contains(&card) => card,
                _ => select_winning_card(&SelectionInput {
                    policy: WinningCardPolicy::LowestLoss,
                    ..clone_without_fixed(input)
                }),
            }
        }
        WinningCardPolicy::Random => {
            let mut rng = rand::thread_rng();
            rng.gen_range(1..=input.card_count)
        }
        WinningCardPolicy::LowestLoss => lowest_loss(input),
    }
}

fn clone_without_fixed<'a>(input: &SelectionInput<'a>) -> SelectionInput<'a> {
    SelectionInput {
        bets: input.bets,
        card_count: input.card_count,
        multiplier: input.multiplier,
        policy: input.policy,
        fixed_winning_card: None,
    }
}

/// For each card `c`: `expected_payout = bets[c] * multiplier`,
/// `profit = total_wagered - expected_payout[c]`. Returns the card with
/// maximum profit, ties broken by lowest card number.
fn lowest_loss(input: &SelectionInput<'_>) -> i32 {
    let total_wagered: Decimal = input.bets.values().map(|m| m.as_decimal()).sum();

    let mut best_card = 1;
    let mut best_profit: Option<Decimal> = None;

    for card in 1..=input.card_count {
        let bet_on_card = input
            .bets
            .get(&card)
            .copied()
            .unwrap_or(Money::ZERO)
            .as_decimal();
        let expected_payout = bet_on_card * input.multiplier;
        let profit = total_wagered - expected_payout;

        match best_profit {
            None => {
                best_profit = Some(profit);
                best_card = card;
            }
            Some(current_best) if profit > current_best => {
                best_profit = Some(profit);
                best_card = card;
            }
            _ => {}
        }
    }

    best_card
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn totals(pairs: &[(i32, &str)]) -> CardTotals {
        pairs
            .iter()
            .map(|(c, amt)| (*c, Money::parse(amt).unwrap()))
            .collect()
    }

    #[test]
    fn single_bet_loses_to_lowest_untouched_card() {
        // spec.md §8 scenario 1: only card 7 has bets; profit is maximal
        // (and equal) for every other card, so the lowest card number wins.
        let bets = totals(&[(7, "10.00")]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::LowestLoss,
            fixed_winning_card: None,
        };
        assert_eq!(select_winning_card(&input), 1);
    }

    #[test]
    fn lowest_loss_tie_break_picks_lowest_card() {
        // spec.md §8 scenario 2.
        let bets = totals(&[(3, "5.00"), (9, "5.00")]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::LowestLoss,
            fixed_winning_card: None,
        };
        assert_eq!(select_winning_card(&input), 1);
    }

    #[test]
    fn lowest_loss_picks_card_with_max_profit() {
        // Two bets on card 1, everything else unbet -> card 1 has higher
        // wagered-but-not-repaid money tied up elsewhere, so a different
        // card (2) maximizes house profit.
        let bets = totals(&[(1, "1.00"), (2, "10.00")]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::LowestLoss,
            fixed_winning_card: None,
        };
        // total wagered = 11; profit(card=1) = 11 - 10 = 1; profit(card=2) = 11 - 100 = -89;
        // profit(any other) = 11 - 0 = 11. Maximum is any untouched card -> lowest is 3.
        assert_eq!(select_winning_card(&input), 3);
    }

    #[test]
    fn fixed_policy_falls_back_to_lowest_loss_when_unset() {
        let bets = totals(&[(7, "10.00")]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::Fixed,
            fixed_winning_card: None,
        };
        assert_eq!(select_winning_card(&input), 1);
    }

    #[test]
    fn fixed_policy_uses_configured_card_when_valid() {
        let bets = totals(&[(7, "10.00")]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::Fixed,
            fixed_winning_card: Some(4),
        };
        assert_eq!(select_winning_card(&input), 4);
    }

    #[test]
    fn random_policy_stays_within_bounds() {
        let bets = totals(&[]);
        let input = SelectionInput {
            bets: &bets,
            card_count: 12,
            multiplier: dec!(10.00),
            policy: WinningCardPolicy::Random,
            fixed_winning_card: None,
        };
        for _ in 0..50 {
            let card = select_winning_card(&input);
            assert!((1..=12).contains(&card));
        }
    }
}

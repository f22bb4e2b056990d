//! Two-stage selection
//!
//! Stage one shortlists the top-N combinations by train net profit. Stage
//! two picks the shortlisted combination with the best validation net
//! profit. Test metrics ride along for reporting only. Ties always go to
//! the combination that comes first in grid order.

use super::{CombinationResult, Selection, SelectionError, ShortlistEntry};

/// Choose a combination from results given in grid order
pub fn select(results: &[CombinationResult], top_n: usize) -> Result<Selection, SelectionError> {
    let mut ranked: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.train.has_trades())
        .map(|(i, _)| i)
        .collect();
    if ranked.is_empty() {
        return Err(SelectionError::NoTrainTrades {
            combinations_evaluated: results.len(),
        });
    }

    // Stable sort keeps grid order among equal train profits
    ranked.sort_by(|&a, &b| results[b].train.net_profit.cmp(&results[a].train.net_profit));
    ranked.truncate(top_n.max(1));

    let mut best_rank = 0;
    for (rank, &idx) in ranked.iter().enumerate() {
        let best = &results[ranked[best_rank]];
        let candidate = &results[idx];
        let better = candidate.validation.net_profit > best.validation.net_profit;
        let tie_earlier = candidate.validation.net_profit == best.validation.net_profit
            && idx < ranked[best_rank];
        if better || tie_earlier {
            best_rank = rank;
        }
    }

    let chosen = &results[ranked[best_rank]];
    let shortlist = ranked
        .iter()
        .map(|&idx| {
            let r = &results[idx];
            ShortlistEntry {
                combination: r.combination,
                label: r.label.clone(),
                train_net_profit: r.train.net_profit,
                validation_net_profit: r.validation.net_profit,
            }
        })
        .collect();

    tracing::info!(
        selected = %chosen.label,
        train_rank = best_rank,
        train_net = %chosen.train.net_profit,
        validation_net = %chosen.validation.net_profit,
        "Selected combination"
    );

    Ok(Selection {
        combination: chosen.combination,
        label: chosen.label.clone(),
        train_rank: best_rank,
        train: chosen.train.clone(),
        validation: chosen.validation.clone(),
        test: chosen.test.clone(),
        shortlist,
    })
}

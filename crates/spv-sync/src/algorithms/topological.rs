//! # Dependency Ordering
//!
//! Orders a batch so that every transaction comes after the in-batch
//! transactions it spends.

use std::collections::{HashMap, HashSet};

use shared_types::{FullTransaction, Hash};

/// Reorder `transactions` so dependencies precede their spenders.
///
/// Transactions with no in-batch dependency keep their relative order.
pub fn in_topological_order(transactions: Vec<FullTransaction>) -> Vec<FullTransaction> {
    let index_by_hash: HashMap<Hash, usize> = transactions
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.header.hash, i))
        .collect();

    let mut order = Vec::with_capacity(transactions.len());
    let mut visited = HashSet::with_capacity(transactions.len());

    for start in 0..transactions.len() {
        // Iterative post-order DFS: (node, next input to inspect).
        let mut stack = vec![(start, 0usize)];
        while let Some((node, next_input)) = stack.pop() {
            if next_input == 0 && !visited.insert(node) {
                continue;
            }
            let inputs = &transactions[node].inputs;
            if let Some(input) = inputs.get(next_input) {
                stack.push((node, next_input + 1));
                if let Some(&dependency) = index_by_hash.get(&input.previous_output_tx_hash) {
                    if dependency != node && !visited.contains(&dependency) {
                        stack.push((dependency, 0));
                    }
                }
            } else {
                order.push(node);
            }
        }
    }

    let mut slots: Vec<Option<FullTransaction>> = transactions.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

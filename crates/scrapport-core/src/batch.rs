// SPDX-License-Identifier: AGPL-3.0-or-later
//! Node counting and request-sized chunking of block trees

use crate::blocks::OutputBlock;

/// Blocks accepted by one append request, nested children included
pub const SUBMISSION_BATCH_LIMIT: usize = 100;

/// Blocks kept on a single destination page before it is split into parts
pub const PAGE_BLOCK_LIMIT: usize = 1000;

/// Total nodes of a forest, counting every descendant
pub fn count_nodes(blocks: &[OutputBlock]) -> usize {
    blocks.iter().map(OutputBlock::node_count).sum()
}

/// Greedily group top-level blocks so each chunk stays within `max_nodes`
///
/// A single block larger than the limit gets a chunk of its own. Order is kept
/// and no block is split or dropped.
pub fn chunk_by_node_count(blocks: Vec<OutputBlock>, max_nodes: usize) -> Vec<Vec<OutputBlock>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_nodes = 0;

    for block in blocks {
        let nodes = block.node_count();
        if !current.is_empty() && current_nodes + nodes > max_nodes {
            chunks.push(std::mem::take(&mut current));
            current_nodes = 0;
        }
        current_nodes += nodes;
        current.push(block);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Title of part `index` (1-based) of a page split into `total` parts
pub fn part_title(title: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        title.to_string()
    } else {
        format!("{title} - {index}/{total}")
    }
}

/// Split `"Title - i/n"` back into its base title and part number
pub fn parse_part_title(title: &str) -> Option<(&str, usize, usize)> {
    let (base, suffix) = title.rsplit_once(" - ")?;
    let (index, total) = suffix.split_once('/')?;
    let index: usize = index.parse().ok()?;
    let total: usize = total.parse().ok()?;
    (index >= 1 && index <= total && total > 1 && !base.is_empty()).then_some((base, index, total))
}

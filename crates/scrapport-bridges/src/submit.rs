// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tree submission in request-sized batches

use std::collections::VecDeque;

use scrapport_core::batch::{chunk_by_node_count, count_nodes, SUBMISSION_BATCH_LIMIT};
use scrapport_core::blocks::{MAX_NESTING_DEPTH, TABLE_CREATE_ROW_LIMIT};
use scrapport_core::OutputBlock;
use serde_json::Value;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::traits::Destination;

type Pending = VecDeque<(String, Vec<OutputBlock>)>;

/// Append `blocks` under `parent_id`, returning the number of nodes created
///
/// Each request carries at most [`SUBMISSION_BATCH_LIMIT`] nodes and at most
/// [`MAX_NESTING_DEPTH`] levels below its top-level blocks. A block that
/// breaks either limit is appended alone and its children are appended under
/// the returned id afterwards, so a parent always exists before its children.
/// Tables too long for one request are created with their first rows and
/// the rest are appended under the table.
pub async fn submit_tree<D>(destination: &D, parent_id: &str, blocks: &[OutputBlock]) -> Result<usize>
where
    D: Destination + ?Sized,
{
    let mut pending: Pending = VecDeque::from([(parent_id.to_string(), blocks.to_vec())]);
    let mut submitted = 0;

    while let Some((parent, blocks)) = pending.pop_front() {
        let mut run = Vec::new();
        for block in blocks {
            if fits_one_request(&block) {
                run.push(block);
                continue;
            }
            submitted += append_batches(destination, &parent, std::mem::take(&mut run)).await?;
            submitted += append_oversized(destination, &parent, block, &mut pending).await?;
        }
        submitted += append_batches(destination, &parent, run).await?;
    }

    Ok(submitted)
}

fn fits_one_request(block: &OutputBlock) -> bool {
    block.node_count() <= SUBMISSION_BATCH_LIMIT && block.depth() <= MAX_NESTING_DEPTH
}

async fn append_batches<D>(destination: &D, parent: &str, blocks: Vec<OutputBlock>) -> Result<usize>
where
    D: Destination + ?Sized,
{
    let mut submitted = 0;
    for chunk in chunk_by_node_count(blocks, SUBMISSION_BATCH_LIMIT) {
        let nodes = count_nodes(&chunk);
        let children = chunk
            .iter()
            .map(OutputBlock::to_json)
            .collect::<scrapport_core::Result<Vec<Value>>>()?;
        destination.append_children(parent, children).await?;
        debug!(parent = %parent, blocks = chunk.len(), nodes, "appended batch");
        submitted += nodes;
    }
    Ok(submitted)
}

async fn append_oversized<D>(
    destination: &D,
    parent: &str,
    block: OutputBlock,
    pending: &mut Pending,
) -> Result<usize>
where
    D: Destination + ?Sized,
{
    if let Some((table, rows)) = block.split_table(TABLE_CREATE_ROW_LIMIT)? {
        let id = append_one(destination, parent, table.to_json()?).await?;
        let mut submitted = table.node_count();
        for batch in rows.chunks(SUBMISSION_BATCH_LIMIT) {
            destination.append_children(&id, batch.to_vec()).await?;
            submitted += batch.len();
        }
        debug!(parent = %parent, id = %id, rows = rows.len(), "appended remaining table rows");
        return Ok(submitted);
    }

    let id = append_one(destination, parent, block.to_json_with(false)?).await?;
    debug!(parent = %parent, id = %id, children = block.children.len(), "deferred oversized subtree");
    let submitted = block.node_count() - count_nodes(&block.children);
    pending.push_back((id, block.children));
    Ok(submitted)
}

async fn append_one<D>(destination: &D, parent: &str, block: Value) -> Result<String>
where
    D: Destination + ?Sized,
{
    destination
        .append_children(parent, vec![block])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::MissingId(format!("block appended under {parent}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDestination;
    use pretty_assertions::assert_eq;
    use scrapport_core::{BlockKind, RichText};

    fn item(children: usize) -> OutputBlock {
        let mut block = OutputBlock::new(BlockKind::ListItem, vec![RichText::plain("item")]);
        block.children = (0..children)
            .map(|i| OutputBlock::paragraph(format!("child {i}")))
            .collect();
        block
    }

    fn table(rows: usize) -> OutputBlock {
        let rows = (0..rows)
            .map(|i| vec![vec![RichText::plain(format!("row {i}"))], Vec::new()])
            .collect();
        OutputBlock::new(BlockKind::Table { width: 2, rows }, Vec::new())
    }

    /// Block objects in one request body, nested ones included
    fn request_nodes(block: &Value) -> usize {
        1 + nested(block).iter().map(request_nodes).sum::<usize>()
    }

    fn request_depth(block: &Value) -> usize {
        nested(block)
            .iter()
            .map(|child| request_depth(child) + 1)
            .max()
            .unwrap_or(0)
    }

    fn nested(block: &Value) -> Vec<Value> {
        let block_type = block["type"].as_str().unwrap_or_default();
        block[block_type]["children"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_batches_stay_within_limit() {
        let destination = FakeDestination::default();
        let blocks: Vec<OutputBlock> = (0..250).map(|_| item(0)).collect();

        let submitted = submit_tree(&destination, "page", &blocks).await.unwrap();

        assert_eq!(submitted, 250);
        let sizes: Vec<usize> = destination
            .appends()
            .iter()
            .map(|(_, children)| children.len())
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_subtrees_are_not_split_across_batches() {
        let destination = FakeDestination::default();
        let blocks = vec![item(60), item(60)];

        submit_tree(&destination, "page", &blocks).await.unwrap();

        let appends = destination.appends();
        assert_eq!(appends.len(), 2);
        assert_eq!(appends[0].1[0]["bulleted_list_item"]["children"].as_array().map(Vec::len), Some(60));
    }

    #[tokio::test]
    async fn test_oversized_block_is_appended_before_children() {
        let destination = FakeDestination::default();
        let blocks = vec![item(150)];

        let submitted = submit_tree(&destination, "page", &blocks).await.unwrap();

        assert_eq!(submitted, 151);
        let appends = destination.appends();
        assert_eq!(appends[0].0, "page");
        assert!(appends[0].1[0]["bulleted_list_item"].get("children").is_none());
        let parent_id = destination.children_of("page")[0]["id"].as_str().unwrap().to_string();
        let nested: usize = appends[1..]
            .iter()
            .inspect(|(parent, _)| assert_eq!(parent, &parent_id))
            .map(|(_, children)| children.len())
            .sum();
        assert_eq!(nested, 150);
    }

    #[tokio::test]
    async fn test_long_table_rows_follow_the_table() {
        let destination = FakeDestination::default();
        let blocks = vec![OutputBlock::paragraph("before"), table(150), OutputBlock::paragraph("after")];

        let submitted = submit_tree(&destination, "page", &blocks).await.unwrap();

        assert_eq!(submitted, 153);
        let appends = destination.appends();
        for (_, children) in &appends {
            assert!(children.iter().map(request_nodes).sum::<usize>() <= SUBMISSION_BATCH_LIMIT);
        }
        let top: Vec<String> = destination
            .children_of("page")
            .iter()
            .map(|b| b["type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(top, vec!["paragraph", "table", "paragraph"]);

        let table_id = destination.children_of("page")[1]["id"].as_str().unwrap().to_string();
        let rows = destination.children_of(&table_id);
        assert_eq!(rows.len(), 150);
        assert!(rows.iter().all(|r| r["type"] == "table_row"));
        assert_eq!(rows[149]["table_row"]["cells"][0][0]["text"]["content"], "row 149");
        let row_requests: Vec<usize> = appends
            .iter()
            .filter(|(parent, _)| *parent == table_id)
            .map(|(_, children)| children.len())
            .collect();
        assert_eq!(row_requests, vec![51]);
    }

    #[tokio::test]
    async fn test_nested_table_inside_list_is_deferred() {
        let destination = FakeDestination::default();
        let mut middle = item(0);
        middle.children.push(table(2));
        let mut top = item(0);
        top.children.push(middle);

        let submitted = submit_tree(&destination, "page", &[top]).await.unwrap();

        assert_eq!(submitted, 5);
        let appends = destination.appends();
        assert_eq!(appends.len(), 2);
        for (_, children) in &appends {
            assert!(children.iter().all(|b| request_depth(b) <= MAX_NESTING_DEPTH));
        }
        let top_id = destination.children_of("page")[0]["id"].as_str().unwrap().to_string();
        assert_eq!(appends[1].0, top_id);
    }
}

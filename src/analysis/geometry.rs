//! Content bounding box aggregation.

use crate::backend::{BBox, ContentBlock};

/// Blocks no wider or taller than this (in points) are layout noise and
/// are dropped before aggregation.
pub const MIN_BLOCK_SIZE_PT: f64 = 0.25;

/// Whether a block takes part in the content box.
pub fn qualifies(block: &ContentBlock, min_size_pt: f64) -> bool {
    block.bbox.width() > min_size_pt && block.bbox.height() > min_size_pt
}

/// Smallest box covering every qualifying text and image block, or `None`
/// when nothing qualifies.
///
/// The union is a fold over (min x0, min y0, max x1, max y1), so block order
/// does not matter.
pub fn content_bbox<'a, I>(blocks: I, min_size_pt: f64) -> Option<BBox>
where
    I: IntoIterator<Item = &'a ContentBlock>,
{
    blocks
        .into_iter()
        .filter(|b| qualifies(b, min_size_pt))
        .map(|b| b.bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
}

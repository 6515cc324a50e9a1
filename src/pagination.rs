//! Pagination – assigns block line ranges to pages.
//!
//! Handles:
//! - deferring blocks that do not fit the remaining space of a page
//! - pairing a heading-like block with the block right after it
//! - splitting blocks taller than an empty page into standalone sub-pages
//!
//! Planning never mutates the blocks; it only records which lines of which
//! block land on each page, so the resulting plans can be rendered in any
//! order.

use crate::blocks::{total_lines, Block};
use crate::layout_plan::{PageGeometry, PagePlan, Placement};

/// Plan every page for `blocks`. Pages are numbered from 1 and never empty.
pub fn plan_pages(blocks: &[Block], geometry: &PageGeometry) -> Vec<PagePlan> {
    let planner = Planner {
        blocks,
        geometry,
        bottom: geometry.text_box.bottom(),
        capacity: geometry.capacity(),
        index: 0,
        offset: 0,
        pages: Vec::new(),
    };
    planner.run()
}

/// Rough page count (cover included) used to pre-size buffers. The planner's
/// real output can differ because of deferrals and spacing.
pub fn estimated_page_count(blocks: &[Block], geometry: &PageGeometry) -> usize {
    total_lines(blocks).div_ceil(geometry.capacity()) + 1
}

struct Planner<'a> {
    blocks: &'a [Block],
    geometry: &'a PageGeometry,
    bottom: f32,
    capacity: usize,
    /// Block currently being placed.
    index: usize,
    /// Lines of `blocks[index]` already placed on earlier pages.
    offset: usize,
    pages: Vec<PagePlan>,
}

/// Page under construction.
struct PageDraft {
    /// Bottom edge of the text placed so far.
    y: f32,
    placements: Vec<Placement>,
}

impl Planner<'_> {
    fn run(mut self) -> Vec<PagePlan> {
        while self.index < self.blocks.len() {
            let draft = self.fill_page();
            self.emit(draft.placements);
        }
        self.pages
    }

    fn fill_page(&mut self) -> PageDraft {
        let blocks = self.blocks;
        let mut draft = PageDraft {
            y: self.geometry.text_box.y,
            placements: Vec::new(),
        };

        while let Some(block) = blocks.get(self.index) {
            let remaining = block.lines.len() - self.offset;
            if !self.geometry.fits(draft.y, remaining) {
                if draft.placements.is_empty() {
                    self.split_oversized();
                }
                break;
            }
            self.place(&mut draft, remaining);

            if !block.kind.is_heading_like() {
                continue;
            }
            let Some(next) = blocks.get(self.index) else {
                break;
            };
            if self.geometry.fits(draft.y, next.lines.len()) {
                self.place(&mut draft, next.lines.len());
                continue;
            }
            let room = ((self.bottom - draft.y) / self.geometry.line_height).floor().max(0.0);
            let fit = (room as usize).min(next.lines.len());
            if fit > 0 {
                self.place(&mut draft, fit);
            }
            break;
        }
        draft
    }

    /// Place `count` lines of the current block and advance the cursor. When
    /// the block is exhausted the planner moves on to the next one.
    fn place(&mut self, draft: &mut PageDraft, count: usize) {
        let start = self.offset;
        draft.placements.push(Placement {
            block: self.index,
            lines: start..start + count,
        });
        let top = self
            .geometry
            .block_top(draft.y, count, draft.placements.len() == 1);
        draft.y = top + count as f32 * self.geometry.line_height;
        self.advance(count);
    }

    fn advance(&mut self, count: usize) {
        self.offset += count;
        if self.offset >= self.blocks[self.index].lines.len() {
            self.index += 1;
            self.offset = 0;
        }
    }

    /// The current block does not fit on an empty page: give it as many
    /// standalone pages of `capacity` lines as it needs.
    fn split_oversized(&mut self) {
        let block = self.index;
        let len = self.blocks[block].lines.len();
        log::debug!(
            "block {} ({} lines) exceeds page capacity {}, splitting",
            block,
            len - self.offset,
            self.capacity
        );
        while self.index == block {
            let start = self.offset;
            let end = (start + self.capacity).min(len);
            self.advance(end - start);
            self.emit(vec![Placement {
                block,
                lines: start..end,
            }]);
        }
    }

    fn emit(&mut self, placements: Vec<Placement>) {
        if placements.is_empty() {
            return;
        }
        let page_number = self.pages.len() as u32 + 1;
        log::debug!(
            "page {}: {} placement(s), {} line(s)",
            page_number,
            placements.len(),
            placements.iter().map(Placement::line_count).sum::<usize>()
        );
        self.pages.push(PagePlan {
            page_number,
            placements,
        });
    }
}

//! Ordered store of the blocks forming the stack
//!
//! Insertion order is stack order; index 0 is the base.

use super::state::{Block, BlockId};

#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Append a block; its `stack_index` becomes the current size
    pub fn add(&mut self, mut block: Block) -> usize {
        let index = self.blocks.len();
        block.stack_index = index;
        self.blocks.push(block);
        index
    }

    /// Remove a block, leaving the other blocks' `stack_index` untouched
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        let pos = self.blocks.iter().position(|b| b.id == id)?;
        Some(self.blocks.remove(pos))
    }

    /// Renumber `stack_index` to match current positions (after a prune batch)
    pub fn compact(&mut self) {
        for (index, block) in self.blocks.iter_mut().enumerate() {
            block.stack_index = index;
        }
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.iter().any(|b| b.id == id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn base(&self) -> Option<&Block> {
        self.blocks.first().filter(|b| b.is_base())
    }

    /// Most recently added block
    pub fn newest(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.iter_mut()
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    /// First block (in stack order) whose centre dropped below the permitted floor
    pub fn check_collapse(
        &self,
        anchor_height: f32,
        block_height: f32,
        collapse_epsilon: f32,
    ) -> Option<BlockId> {
        let floor = anchor_height - block_height / 2.0 - collapse_epsilon;
        self.blocks
            .iter()
            .find(|b| b.position.y < floor)
            .map(|b| b.id)
    }
}

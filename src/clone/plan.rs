// Ordered block lengths for a clone transfer

use super::session::CloneError;

/// One block of a transfer, positioned within the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

/// Block lengths that tile an image of a fixed size exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    lengths: Vec<usize>,
    total: usize,
}

impl BlockPlan {
    pub fn new(lengths: &[usize], image_size: usize) -> Result<Self, CloneError> {
        if lengths.is_empty() {
            return Err(CloneError::InvalidBlockPlan("no blocks".to_string()));
        }
        if let Some(index) = lengths.iter().position(|&len| len == 0) {
            return Err(CloneError::InvalidBlockPlan(format!(
                "block {} has zero length",
                index
            )));
        }

        let total: usize = lengths.iter().sum();
        if total != image_size {
            return Err(CloneError::InvalidBlockPlan(format!(
                "blocks total {} bytes, image is {}",
                total, image_size
            )));
        }

        Ok(Self {
            lengths: lengths.to_vec(),
            total,
        })
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn first_len(&self) -> usize {
        self.lengths.first().copied().unwrap_or(0)
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.lengths
            .iter()
            .scan(0usize, |offset, &len| {
                let start = *offset;
                *offset += len;
                Some((start, len))
            })
            .enumerate()
            .map(|(index, (offset, len))| Block { index, offset, len })
    }
}

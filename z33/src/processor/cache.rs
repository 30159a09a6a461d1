//! Lazily-decoded instruction cache (spec §5 "Performance").
//!
//! Decoding the 64-bit word pair at an address is pure given the memory
//! contents at that address, but re-running it on every fetch of a tight
//! loop body is wasted work. The cache remembers the decoded instruction
//! per even address; writes to memory invalidate the whole cache, since
//! self-modifying code is rare enough in the teaching material that a
//! precise invalidation isn't worth the bookkeeping.

use crate::instruction::Instruction;

#[derive(Clone, Debug, Default)]
pub struct InstructionCache {
    entries: Vec<Option<Instruction>>,
}

impl InstructionCache {
    pub fn new(memory_size: u32) -> InstructionCache {
        InstructionCache {
            entries: vec![None; memory_size as usize],
        }
    }

    pub fn get(&self, address: u32) -> Option<Instruction> {
        self.entries.get(address as usize).copied().flatten()
    }

    pub fn store(&mut self, address: u32, instruction: Instruction) {
        if let Some(slot) = self.entries.get_mut(address as usize) {
            *slot = Some(instruction);
        }
    }

    /// Drops every cached decode. Called after any memory write, since that
    /// write might have landed inside code already decoded.
    pub fn invalidate_all(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn caches_and_invalidates() {
        let mut cache = InstructionCache::new(16);
        cache.store(4, Instruction::Nop);
        assert_eq!(cache.get(4), Some(Instruction::Nop));
        cache.invalidate_all();
        assert_eq!(cache.get(4), None);
    }
}

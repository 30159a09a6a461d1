//! A read-only region mounted over a writable backing store, for programs
//! that want part of their address space to behave like ROM.

use super::Storage;
use crate::exception::Exception;
use thiserror::Error;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Error)]
pub enum MountError {
    #[error("rom region [{base}, {base}+{len}) overlaps the end of the backing store")]
    OutOfRange { base: u32, len: u32 },
}

/// Wraps a backing [`Storage`] so that writes landing in `[base, base+rom.len())`
/// are rejected instead of reaching the backing store. Reads always pass
/// through untouched, whether or not they land in the rom window.
#[derive(Clone, Debug)]
pub struct CompositeMemory<M> {
    backing: M,
    rom_base: u32,
    rom: Vec<u32>,
}

impl<M: Storage> CompositeMemory<M> {
    /// Mounts `rom` read-only at `rom_base`, copying its contents into the
    /// backing store so reads see it through the ordinary path.
    pub fn mount(mut backing: M, rom_base: u32, rom: Vec<u32>) -> Result<CompositeMemory<M>, MountError> {
        if rom_base as u64 + rom.len() as u64 > backing.size() as u64 {
            return Err(MountError::OutOfRange {
                base: rom_base,
                len: rom.len() as u32,
            });
        }
        for (offset, word) in rom.iter().enumerate() {
            backing
                .set(rom_base + offset as u32, *word)
                .expect("range checked above");
        }
        Ok(CompositeMemory {
            backing,
            rom_base,
            rom,
        })
    }

    fn in_rom(&self, address: u32) -> bool {
        address >= self.rom_base && address < self.rom_base + self.rom.len() as u32
    }

    pub fn into_inner(self) -> M {
        self.backing
    }
}

impl<M: Storage> Storage for CompositeMemory<M> {
    fn size(&self) -> u32 {
        self.backing.size()
    }

    fn get(&self, address: u32) -> Result<u32, Exception> {
        self.backing.get(address)
    }

    fn set(&mut self, address: u32, value: u32) -> Result<(), Exception> {
        if self.in_rom(address) {
            return Err(Exception::InvalidMemoryAccess);
        }
        self.backing.set(address, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[test]
    fn writes_into_the_rom_window_are_rejected() {
        let memory = CompositeMemory::mount(Memory::new(), 10, vec![1, 2, 3]).unwrap();
        let mut memory = memory;
        assert_eq!(memory.get(11), Ok(2));
        assert_eq!(memory.set(11, 99), Err(Exception::InvalidMemoryAccess));
        assert_eq!(memory.set(50, 99), Ok(()));
    }

    #[test]
    fn mount_past_the_end_is_rejected() {
        let result = CompositeMemory::mount(Memory::new(), crate::constants::MEMORY_SIZE - 1, vec![1, 2, 3]);
        assert!(result.is_err());
    }
}

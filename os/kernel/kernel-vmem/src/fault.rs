use crate::{AddressSpace, Mmu, PagingError};
use bitfield_struct::bitfield;
use kernel_alloc::FramePoolError;
use kernel_memory_addresses::{FrameNumber, VirtualAddress};
use log::error;

/// Interrupt vector of the page fault exception.
pub const PAGE_FAULT_VECTOR: usize = 0x0E;

/// Page-fault error code pushed by the CPU (Intel SDM Vol. 3A, §6.15).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool,

    /// 0 = read, 1 = write.
    pub write: bool,

    /// 0 = supervisor, 1 = user mode (CPL 3).
    pub user: bool,

    /// Reserved bit set in a paging structure.
    pub reserved_bit: bool,

    /// Instruction fetch.
    pub instruction_fetch: bool,

    #[bits(27)]
    __: u32,
}

impl PageFaultError {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "non-present page"
        } else if self.reserved_bit() {
            "reserved bit set in a paging structure"
        } else if self.instruction_fetch() {
            "instruction fetch from protected page"
        } else if self.write() {
            "write access to protected page"
        } else {
            "read access to protected page"
        }
    }
}

/// One page fault as delivered by the trap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    /// Faulting linear address (CR2).
    pub address: VirtualAddress,
    pub error: PageFaultError,
    /// Saved `EIP` of the faulting instruction.
    pub instruction_pointer: VirtualAddress,
}

impl PageFault {
    /// A not-present fault on `address`, as raised by a plain write.
    #[must_use]
    pub const fn not_present_write(address: VirtualAddress) -> Self {
        Self {
            address,
            error: PageFaultError::new().with_write(true),
            instruction_pointer: VirtualAddress::zero(),
        }
    }
}

/// What the fault handler did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// A data frame was installed, plus a new page table if the directory
    /// slot was empty.
    Mapped {
        page: FrameNumber,
        table: Option<FrameNumber>,
    },
    /// The page was already present, nothing to do.
    AlreadyMapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultError {
    #[error("access to {0} lies outside every registered region")]
    IllegitimateAddress(VirtualAddress),
    #[error("protection violation at {address}: {}", .error.explain())]
    ProtectionViolation {
        address: VirtualAddress,
        error: PageFaultError,
    },
    #[error(transparent)]
    Paging(#[from] PagingError),
}

impl From<FramePoolError> for FaultError {
    fn from(value: FramePoolError) -> Self {
        Self::Paging(PagingError::Frames(value))
    }
}

/// Trap-level entry for vector [`PAGE_FAULT_VECTOR`].
///
/// Reads CR2, assembles the [`PageFault`] from the pushed error code and the
/// saved instruction pointer, and lets `space` service it.
///
/// # Panics
/// Every [`FaultError`] is unrecoverable at this level and halts the kernel.
pub fn dispatch_page_fault<M: Mmu>(
    space: &AddressSpace<'_, M>,
    error_code: u32,
    instruction_pointer: u32,
) -> FaultOutcome {
    let fault = PageFault {
        address: space.mmu().fault_address(),
        error: PageFaultError::from_bits(error_code),
        instruction_pointer: VirtualAddress::new(instruction_pointer),
    };

    match space.handle_fault(&fault) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                "page fault at {} (eip {}, err {:#x}): {err}",
                fault.address,
                fault.instruction_pointer,
                fault.error.into_bits()
            );
            panic!("unrecoverable page fault at {}: {err}", fault.address);
        }
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, log_enabled, trace};

use crate::block::{AllocationFailure, MemoryBlock};
use crate::page::page_offsets;

/// Value written to every page during the fault-in pass.
pub const FAULT_IN_VALUE: u8 = 1;
/// XOR mask applied to every page on each keep-hot pass.
pub const TOGGLE_MASK: u8 = 1;

/// Lifecycle of a generator. A failed allocation never yields a generator, so
/// the failed state is the `Err` returned by [`WorkingSetGenerator::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Allocated,
    Resident,
    KeepingHot,
}

/// Cancellation point for the keep-hot loop, checked once per full pass.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct WorkingSetGenerator {
    block: MemoryBlock,
    phase: Phase,
    passes: u64,
}

impl WorkingSetGenerator {
    pub fn allocate(size: usize, page_stride: usize) -> Result<Self, AllocationFailure> {
        let block = MemoryBlock::allocate(size, page_stride).map_err(|err| {
            debug!("Phase {:?} -> failed: {}", Phase::Start, err);
            err
        })?;
        let phase = advance(Phase::Start, Phase::Allocated);
        Ok(Self { block, phase, passes: 0 })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    /// Completed keep-hot passes so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Writes once to every page so the OS has to back it with real memory.
    /// Returns the number of page touches.
    pub fn fault_in_all_pages(&mut self) -> usize {
        let (size, stride) = (self.block.len(), self.block.page_stride());
        let mut touched = 0;
        for offset in page_offsets(size, stride) {
            self.block.touch(offset, FAULT_IN_VALUE);
            touched += 1;
        }
        debug!("Faulted in {} pages ({} bytes, stride {})", touched, size, stride);
        self.phase = advance(self.phase, Phase::Resident);
        touched
    }

    /// Flips one byte per page, pass after pass, until `stop` is raised.
    /// There is no pacing between passes. Returns the passes completed by this call.
    pub fn keep_hot_until(&mut self, stop: &StopFlag) -> u64 {
        if self.phase != Phase::KeepingHot {
            self.phase = advance(self.phase, Phase::KeepingHot);
        }
        let (size, stride) = (self.block.len(), self.block.page_stride());
        let mut done = 0;
        while !stop.is_stopped() {
            for offset in page_offsets(size, stride) {
                self.block.toggle(offset, TOGGLE_MASK);
            }
            done += 1;
            if log_enabled!(log::Level::Trace) {
                trace!("Keep-hot pass {} complete", self.passes + done);
            }
        }
        self.passes += done;
        debug!("Keep-hot stopped after {} passes", done);
        done
    }

    pub fn keep_hot_forever(&mut self) -> ! {
        let never = StopFlag::new();
        loop {
            self.keep_hot_until(&never);
        }
    }
}

fn advance(from: Phase, to: Phase) -> Phase {
    debug!("Phase {:?} -> {:?}", from, to);
    to
}

/// Allocate the block and fault in every page. Nothing is touched if the
/// allocation fails.
pub fn prepare(size: usize, page_stride: usize) -> Result<WorkingSetGenerator, AllocationFailure> {
    let mut generator = WorkingSetGenerator::allocate(size, page_stride)?;
    let pages = generator.fault_in_all_pages();
    info!("Working set of {} bytes resident across {} pages", size, pages);

    match crate::rss::resident_bytes() {
        Ok(rss) => debug!("Resident set after fault-in: {} bytes", rss),
        Err(err) => debug!("Could not sample resident set: {:#}", err),
    }

    Ok(generator)
}

/// Like the binary, but returns once `stop` is raised.
pub fn run(size: usize, page_stride: usize, stop: &StopFlag) -> Result<u64, AllocationFailure> {
    Ok(prepare(size, page_stride)?.keep_hot_until(stop))
}

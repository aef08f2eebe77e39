use log::warn;

pub const FALLBACK_PAGE_SIZE: usize = 4096;

/// Page size reported by the OS, or 4 KiB if it reports nonsense.
pub fn system_page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        warn!("sysconf(_SC_PAGESIZE) returned {}, assuming {}", size, FALLBACK_PAGE_SIZE);
        FALLBACK_PAGE_SIZE
    } else {
        size as usize
    }
}

/// Offsets `0, stride, 2*stride, ...` strictly below `size`.
pub fn page_offsets(size: usize, stride: usize) -> impl Iterator<Item = usize> {
    // step_by panics on zero
    (0..size).step_by(stride.max(1))
}

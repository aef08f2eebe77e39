//! A synthetic, predictable memory consumer.
//!
//! Reserves a fixed block, writes to every page once so the OS has to back
//! it with physical memory, then keeps flipping one byte per page forever so
//! the block stays dirty and recently used. Meant to be spawned by a test
//! harness that watches resident memory and kills the process when done.

pub mod block;
pub mod generator;
pub mod page;
pub mod rss;

/// Size of the working set held by the `hotset` binary: 10 MiB.
pub const BLOCK_SIZE: usize = 10 * 1024 * 1024;

//! Z-order keys for grid cells
//!
//! Cells are ordered along the Z-order curve so that contiguous runs of the
//! ordering are spatially compact, which keeps partitions compact too.

/// Spreads the low 21 bits of `v` to every 3rd bit
#[inline(always)]
fn spread_bits(v: u32) -> u64 {
    let mut x = (v as u64) & 0x1f_ffff;
    x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Z-order key of integer cell coordinates, x in the lowest bit of each triple.
/// Coordinates must be below 2^21, which configuration validation enforces.
#[inline(always)]
pub fn morton_encode(x: u32, y: u32, z: u32) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

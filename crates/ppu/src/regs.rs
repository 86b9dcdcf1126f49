//! PPU MMIO register map and register-value packing.
//!
//! A 0x50-byte block of write-only control registers at 0xFF20_0030 on
//! the hard processor system bus. The layout is byte-exact to the
//! peripheral; values are mirrored by writes only and never read back.

/// Physical base address of the PPU control block.
pub const PPU_MMIO_BASE: u32 = 0xFF20_0030;

/// Span of the PPU control block in bytes.
pub const PPU_MMIO_SPAN: usize = 0x50;

/// DMA source-address register. Writing this starts the VRAM transfer.
pub const REG_DMA_ADDR: usize = 0x00;

/// Background tile-layer scroll register (packed x/y).
pub const REG_BGSCROLL: usize = 0x10;

/// Foreground tile-layer scroll register (packed x/y).
pub const REG_FGSCROLL: usize = 0x20;

/// Universal background color register (24-bit RGB).
pub const REG_BGCOLOR: usize = 0x30;

/// Render-enable register.
pub const REG_ENABLE: usize = 0x40;

/// Size in bytes of one VRAM image — tile layers, sprites, patterns and
/// palettes combined. Offset-addressed writes are bounds-checked against
/// this.
pub const VRAM_SIZE: usize = 0xD140;

/// Configuration command numbers, ioctl-style.
//@{
/// Present the composed frame (arm the DMA transfer).
pub const CMD_UPDATE: u32 = 0;
/// Set the background layer scroll (param: packed x/y).
pub const CMD_SET_BGSCROLL: u32 = 1;
/// Set the foreground layer scroll (param: packed x/y).
pub const CMD_SET_FGSCROLL: u32 = 2;
/// Set the universal background color (param: 24-bit RGB).
pub const CMD_SET_BGCOLOR: u32 = 3;
/// Enable or disable rendering (param: 0 or 1).
pub const CMD_SET_ENABLE: u32 = 4;
//@}

/// Mask applied to background-color values; the register is 24-bit RGB.
pub const COLOR_24MASK: u32 = 0x00FF_FFFF;

/// Pack a scroll position into the register format: y in the high
/// half-word, x in the low.
#[must_use]
pub const fn pack_scroll(x: u16, y: u16) -> u32 {
    ((y as u32) << 16) | (x as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_packs_y_high_x_low() {
        assert_eq!(pack_scroll(0, 0), 0);
        assert_eq!(pack_scroll(0x0123, 0x0456), 0x0456_0123);
        assert_eq!(pack_scroll(u16::MAX, u16::MAX), 0xFFFF_FFFF);
    }
}

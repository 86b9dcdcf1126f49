//! APU MMIO register map.
//!
//! The register layout is byte-exact to the peripheral: a 0x20-byte
//! block of write-only control registers at 0xFF20_0010 on the hard
//! processor system bus. Device state is mirrored by writes only and
//! never read back.

/// Physical base address of the APU control block.
pub const APU_MMIO_BASE: u32 = 0xFF20_0010;

/// Span of the APU control block in bytes.
pub const APU_MMIO_SPAN: usize = 0x20;

/// Config register: IRQ acknowledge/request and enable bits.
pub const REG_CONFIG: usize = 0x00;

/// Sample buffer bus-address register. Writing this is the point at
/// which hardware may begin consuming the buffer.
pub const REG_BUF: usize = 0x10;

/// Config bit: acknowledge the pending interrupt, dropping the IRQ line.
pub const CFG_IRQ_ACK: u32 = 0x01;

/// Config bit: request a completion interrupt for the submitted buffer.
pub const CFG_IRQ_REQ: u32 = 0x02;

/// Config bit: enable audio output.
pub const CFG_ENABLE: u32 = 0x04;

/// Size in bytes of each sample buffer half — the hard ceiling for a
/// single submission.
pub const SAMPLE_BUF_SIZE: usize = 512;

/// The one configuration command the APU recognizes: register (or, with
/// a zero parameter, clear) the consumer identity that completion
/// notifications are delivered to.
pub const CMD_SET_CONSUMER: u32 = 0;

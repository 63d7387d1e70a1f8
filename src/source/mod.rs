//! Collaborators the schedulers read from.
//!
//! The delivery core never touches codestream bytes. It asks three narrow
//! interfaces for offsets, lengths and cache state:
//!
//! - [`CacheLedger`]: how much of each precinct data-bin a client already has
//! - [`CodestreamStore`]: coding-pass offsets and lengths per code-block
//! - [`PacketIndex`]: the codestream's own packets, where the store knows them
//!
//! A store that cannot answer a packet query returns
//! [`Capability::Unsupported`] rather than a sentinel value.

mod ledger;
mod model;

use crate::codestream::{InClassId, SubbandKind};

pub use ledger::{LedgerEntry, LedgerUpdate, MemoryLedger};
pub use model::ModelStore;

/// Result of a query a collaborator may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn supported(self) -> Option<T> {
        match self {
            Capability::Supported(value) => Some(value),
            Capability::Unsupported => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Capability<U> {
        match self {
            Capability::Supported(value) => Capability::Supported(f(value)),
            Capability::Unsupported => Capability::Unsupported,
        }
    }
}

/// Per-client record of what has been delivered.
///
/// `bytes_delivered` is an offset into the precinct's data-bin as laid out
/// by the scheduler that produced it.
pub trait CacheLedger {
    fn bytes_delivered(&self, id: InClassId) -> u64;

    fn layers_delivered(&self, id: InClassId) -> u16;
}

/// Address of a code-block inside a precinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub band: SubbandKind,
    pub y_block: u32,
    pub x_block: u32,
}

impl BlockRef {
    pub const fn new(band: SubbandKind, y_block: u32, x_block: u32) -> Self {
        Self {
            band,
            y_block,
            x_block,
        }
    }
}

/// Byte-level view of the codestream's coding passes.
pub trait CodestreamStore: Send + Sync {
    /// Number of coding passes the encoder produced for a block.
    fn coding_passes(&self, id: InClassId, block: BlockRef) -> u16;

    /// File offset of coding pass `pass` of a block.
    fn coding_pass_offset(&self, id: InClassId, block: BlockRef, pass: u16) -> u64;

    /// Length in bytes of coding pass `pass` of a block.
    fn coding_pass_length(&self, id: InClassId, block: BlockRef, pass: u16) -> u32;

    /// Missing most-significant bit-planes per block, one array per subband
    /// in the precinct's band order, blocks in raster order.
    fn zero_bit_planes(&self, id: InClassId) -> Vec<Vec<u8>>;
}

/// Location of one stored packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketExtent {
    /// File offset of the packet header
    pub offset: u64,
    pub header_length: u32,
    /// Packet body follows the header directly
    pub body_length: u32,
}

impl PacketExtent {
    pub fn length(&self) -> u64 {
        self.header_length as u64 + self.body_length as u64
    }

    pub fn body_offset(&self) -> u64 {
        self.offset + self.header_length as u64
    }
}

/// The codestream's own packet structure.
pub trait PacketIndex: Send + Sync {
    /// Number of quality layers stored for a precinct.
    fn layer_count(&self, id: InClassId) -> Capability<u16>;

    /// Extent of the packet for `layer`.
    fn packet(&self, id: InClassId, layer: u16) -> Capability<PacketExtent>;

    fn packet_length(&self, id: InClassId, layer: u16) -> Capability<u64> {
        self.packet(id, layer).map(|extent| extent.length())
    }
}

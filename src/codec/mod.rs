//! Packet header coding.
//!
//! Schedulers that synthesize their own quality layers need a packet header
//! for every (precinct, layer) they emit. The header only depends on which
//! coding passes of which code-blocks the layer carries, so it is produced
//! by a [`PacketHeaderCodec`] from per-block pass lengths.
//!
//! Codecs are stateful per precinct: inclusion and zero bit-plane tag trees
//! and the `Lblock` length state carry over from one layer to the next, so
//! a precinct's headers must be requested in layer order after
//! [`PacketHeaderCodec::begin_precinct`].

mod bit_writer;
mod tag_tree;
mod tier2;

use bytes::Bytes;

use crate::codestream::{CodeBlockGrid, InClassId};

pub use bit_writer::HeaderBitWriter;
pub use tag_tree::TagTree;
pub use tier2::{encode_pass_count, Tier2HeaderCodec};

/// Turns per-block coding pass lengths into packet header bytes.
pub trait PacketHeaderCodec {
    /// Reset the state of a precinct.
    ///
    /// `first_layers[band][block]` is the layer in which each block first
    /// contributes (`None` if never) and `zero_bit_planes[band][block]` its
    /// missing most-significant bit-planes. Bands follow `grids`, blocks are
    /// in raster order. A block must contribute at least one pass in its
    /// first layer.
    fn begin_precinct(
        &mut self,
        id: InClassId,
        grids: &[CodeBlockGrid],
        first_layers: &[Vec<Option<u16>>],
        zero_bit_planes: &[Vec<u8>],
    );

    /// Encode the header of packet `layer`. `pass_lengths[band][block]`
    /// lists the lengths of the passes each block contributes to it.
    fn encode_header(&mut self, id: InClassId, layer: u16, pass_lengths: &[Vec<Vec<u32>>]) -> Bytes;

    /// Drop the state of a precinct.
    fn end_precinct(&mut self, id: InClassId);
}

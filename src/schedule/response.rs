//! Response assembly.
//!
//! Schedulers describe a response as a list of chunks, each one a packet
//! header or a run of byte ranges from the codestream, tagged with the
//! precinct data-bin and offset it extends. [`ByteBudget`] enforces the
//! response size: headers are never split, bodies may be cut short.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;

use crate::codestream::InClassId;
use crate::source::{CacheLedger, LedgerUpdate};
use crate::window::RelevantPrecinct;

// =============================================================================
// Response Chunks
// =============================================================================

/// What a response chunk carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkPayload {
    /// Packet header bytes produced by a header codec
    EncodedHeader { bytes: Bytes },

    /// Packet header stored in the codestream
    StoredHeader { offset: u64, length: u32 },

    /// Coding-pass bytes of the codestream
    CodingPasses { offset: u64, length: u32 },
}

impl ChunkPayload {
    pub fn len(&self) -> u64 {
        match self {
            ChunkPayload::EncodedHeader { bytes } => bytes.len() as u64,
            ChunkPayload::StoredHeader { length, .. } | ChunkPayload::CodingPasses { length, .. } => {
                *length as u64
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_header(&self) -> bool {
        !matches!(self, ChunkPayload::CodingPasses { .. })
    }
}

/// One piece of a response, tagged with the precinct data-bin it extends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseChunk {
    pub precinct: InClassId,

    /// Layer of the precinct this chunk belongs to
    pub layer: u16,

    /// Position of the chunk inside the precinct data-bin
    pub data_bin_offset: u64,

    pub payload: ChunkPayload,
}

impl ResponseChunk {
    pub fn len(&self) -> u64 {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Data-bin offset right after this chunk.
    pub fn end(&self) -> u64 {
        self.data_bin_offset + self.len()
    }
}

/// Why a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    /// Everything the window needs has been sent or was already cached
    WindowDone,

    /// The byte budget ran out first
    ByteLimitReached,
}

/// Result of one scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub scheduler: &'static str,
    pub chunks: Vec<ResponseChunk>,
    pub end_reason: EndReason,
    progress: Vec<LedgerUpdate>,
}

impl Schedule {
    /// Total bytes of all chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(ResponseChunk::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Cache state of every precinct this response extends, once the
    /// chunks have been transmitted.
    pub fn ledger_updates(&self) -> &[LedgerUpdate] {
        &self.progress
    }

    /// Chunks of one precinct, in response order.
    pub fn chunks_for(&self, id: InClassId) -> impl Iterator<Item = &ResponseChunk> {
        self.chunks.iter().filter(move |chunk| chunk.precinct == id)
    }
}

// =============================================================================
// Byte Budget
// =============================================================================

/// Remaining response size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBudget {
    remaining: Option<u64>,
}

impl ByteBudget {
    /// A budget that never runs out.
    pub fn unbounded() -> Self {
        Self { remaining: None }
    }

    pub fn new(max_bytes: u64) -> Self {
        Self {
            remaining: Some(max_bytes),
        }
    }

    /// Bounded by `max_bytes`, or unbounded for `None`.
    pub fn from_limit(max_bytes: Option<u64>) -> Self {
        Self { remaining: max_bytes }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Take exactly `bytes` or nothing.
    ///
    /// Used for data that must not be split, such as packet headers.
    ///
    /// # Returns
    ///
    /// `true` if the bytes were taken. On `false` the budget is unchanged.
    pub fn try_take(&mut self, bytes: u64) -> bool {
        match &mut self.remaining {
            None => true,
            Some(left) if *left >= bytes => {
                *left -= bytes;
                true
            }
            Some(_) => false,
        }
    }

    /// Take as much of `bytes` as is left.
    pub fn take_up_to(&mut self, bytes: u64) -> u64 {
        match &mut self.remaining {
            None => bytes,
            Some(left) => {
                let taken = bytes.min(*left);
                *left -= taken;
                taken
            }
        }
    }

    /// Bytes that could be taken right now, capped at `bytes`.
    pub fn available(&self, bytes: u64) -> u64 {
        self.remaining.map_or(bytes, |left| left.min(bytes))
    }
}

// =============================================================================
// Data-bin Builder
// =============================================================================

/// Contiguous range of codestream bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRange {
    pub offset: u64,
    pub length: u32,
}

impl FileRange {
    pub fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }
}

/// Append a range, merging it into the previous one when they touch.
pub(crate) fn push_range(ranges: &mut Vec<FileRange>, offset: u64, length: u32) {
    if length == 0 {
        return;
    }
    if let Some(last) = ranges.last_mut() {
        if last.offset + last.length as u64 == offset {
            if let Some(merged) = last.length.checked_add(length) {
                last.length = merged;
                return;
            }
        }
    }
    ranges.push(FileRange::new(offset, length));
}

/// Header segment of one layer.
#[derive(Debug, Clone)]
pub(crate) enum LayerHeader {
    Encoded(Bytes),
    Stored { offset: u64, length: u32 },
}

impl LayerHeader {
    fn len(&self) -> u64 {
        match self {
            LayerHeader::Encoded(bytes) => bytes.len() as u64,
            LayerHeader::Stored { length, .. } => *length as u64,
        }
    }

    fn suffix(&self, skip: u64) -> ChunkPayload {
        match self {
            LayerHeader::Encoded(bytes) => ChunkPayload::EncodedHeader {
                bytes: bytes.slice(skip as usize..),
            },
            LayerHeader::Stored { offset, length } => ChunkPayload::StoredHeader {
                offset: offset + skip,
                length: length - skip as u32,
            },
        }
    }
}

/// Outcome of pushing one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    /// The client already held the whole layer
    Cached,
    /// The unsent part of the layer was queued
    Queued,
    /// The budget ran out inside the layer
    Stopped,
}

/// Builds a response by walking precinct data-bins layer by layer.
///
/// A data-bin is `header(0) ‖ passes(0) ‖ header(1) ‖ passes(1) ‖ ...`.
/// The walk position of every precinct lives in its
/// [`RelevantPrecinct::bytes_queued`]; bytes below the ledger's recorded
/// offset are skipped. Headers are sent whole or not at all, pass bytes
/// may be cut at the budget.
pub(crate) struct ResponseBuilder<'a> {
    ledger: &'a dyn CacheLedger,
    budget: ByteBudget,
    /// Smallest partial pass payload worth sending for a non-final layer
    min_partial: u64,
    chunks: Vec<ResponseChunk>,
    progress: Vec<LedgerUpdate>,
    touched: HashMap<InClassId, usize>,
    stopped: bool,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(ledger: &'a dyn CacheLedger, budget: ByteBudget) -> Self {
        Self {
            ledger,
            budget,
            min_partial: 0,
            chunks: Vec::new(),
            progress: Vec::new(),
            touched: HashMap::new(),
            stopped: false,
        }
    }

    pub fn with_min_partial(mut self, bytes: u64) -> Self {
        self.min_partial = bytes;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Reset a precinct's walk to the start of its data-bin.
    pub fn rewind(&self, precinct: &mut RelevantPrecinct) {
        precinct.bytes_queued = 0;
        precinct.layers_queued = 0;
        precinct.packet_offset = 0;
    }

    /// Queue the next layer of a precinct. `final_layer` marks the last
    /// layer the precinct has.
    pub fn push_layer(
        &mut self,
        precinct: &mut RelevantPrecinct,
        header: LayerHeader,
        body: &[FileRange],
        final_layer: bool,
    ) -> Pushed {
        if self.stopped {
            return Pushed::Stopped;
        }

        let id = precinct.id;
        let layer = precinct.layers_queued;
        let cached = self.ledger.bytes_delivered(id);
        let start = precinct.bytes_queued;
        let header_len = header.len();
        let body_len: u64 = body.iter().map(|r| r.length as u64).sum();
        let end = start + header_len + body_len;

        if end <= cached {
            precinct.bytes_queued = end;
            precinct.layers_queued += 1;
            return Pushed::Cached;
        }

        if start + header_len > cached {
            let skip = cached.saturating_sub(start);
            if !self.budget.try_take(header_len - skip) {
                return self.stop(precinct, start + skip);
            }
            if header_len > skip {
                self.chunks.push(ResponseChunk {
                    precinct: id,
                    layer,
                    data_bin_offset: start + skip,
                    payload: header.suffix(skip),
                });
            }
        }

        let mut position = start + header_len;
        for range in body {
            let length = range.length as u64;
            if position + length <= cached {
                position += length;
                continue;
            }
            let skip = cached.saturating_sub(position);
            let wanted = length - skip;
            let mut granted = self.budget.available(wanted);
            if granted < wanted && granted < self.min_partial && !final_layer {
                granted = 0;
            }
            let taken = self.budget.take_up_to(granted);
            if taken > 0 {
                self.chunks.push(ResponseChunk {
                    precinct: id,
                    layer,
                    data_bin_offset: position + skip,
                    payload: ChunkPayload::CodingPasses {
                        offset: range.offset + skip,
                        length: taken as u32,
                    },
                });
            }
            if taken < wanted {
                precinct.packet_offset = position + skip + taken - start;
                return self.stop(precinct, position + skip + taken);
            }
            position += length;
        }

        precinct.bytes_queued = end;
        precinct.layers_queued += 1;
        precinct.packet_offset = 0;
        self.record(id, end, precinct.layers_queued);
        Pushed::Queued
    }

    fn stop(&mut self, precinct: &RelevantPrecinct, reached: u64) -> Pushed {
        self.stopped = true;
        self.record(precinct.id, reached, precinct.layers_queued);
        Pushed::Stopped
    }

    fn record(&mut self, id: InClassId, bytes: u64, layers: u16) {
        let bytes = bytes.max(self.ledger.bytes_delivered(id));
        let layers = layers.max(self.ledger.layers_delivered(id));
        if bytes <= self.ledger.bytes_delivered(id) && !self.touched.contains_key(&id) {
            return;
        }
        match self.touched.get(&id) {
            Some(&i) => {
                let update = &mut self.progress[i];
                update.bytes_delivered = update.bytes_delivered.max(bytes);
                update.layers_delivered = update.layers_delivered.max(layers);
            }
            None => {
                self.touched.insert(id, self.progress.len());
                self.progress.push(LedgerUpdate {
                    id,
                    bytes_delivered: bytes,
                    layers_delivered: layers,
                });
            }
        }
    }

    pub fn finish(self, scheduler: &'static str) -> Schedule {
        let end_reason = if self.stopped {
            EndReason::ByteLimitReached
        } else {
            EndReason::WindowDone
        };
        Schedule {
            scheduler,
            chunks: self.chunks,
            end_reason,
            progress: self.progress,
        }
    }
}

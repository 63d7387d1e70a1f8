//! Scheduler behavior against the rate model store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use jpip_streamer::codestream::SubbandKind;
use jpip_streamer::schedule::{
    estimated_layer_slopes, merge_block_order, remove_liars, slope_curve, BandClass, CodingPassId, CordPlan,
    LayerPlan,
};
use jpip_streamer::{
    BlockRef, ChunkPayload, CodestreamStore, Cord, Cpi, CpiVariant, EndReason, InClassId, MemoryLedger,
    ModelStore, PacketIndex, Point, ProgressionOrder, Resolver, Schedule, Scheduler, Size,
    SubbandWeights, ViewWindow, Wsf,
};

use super::test_utils::{
    all_schedulers, assert_contiguous, color_layout, two_tile_layout, Fixture, FixedPackets, TruncatedStore,
};

fn replayed(ledger: &MemoryLedger, schedule: &Schedule) -> MemoryLedger {
    let mut next = ledger.clone();
    next.apply(schedule.ledger_updates());
    next
}

// =============================================================================
// Budget and Cache
// =============================================================================

#[test]
fn test_budget_is_never_exceeded() {
    for layout in [two_tile_layout(), color_layout()] {
        let fixture = Fixture::open(&layout);
        let window = fixture.full_window();
        for scheduler in all_schedulers() {
            let full = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), None);
            assert_eq!(full.end_reason, EndReason::WindowDone, "{}", scheduler.name());

            for budget in [1u64, 17, 100, 333, 1000, 5000] {
                let schedule = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), Some(budget));
                assert!(
                    schedule.total_bytes() <= budget,
                    "{}: {} bytes over a budget of {budget}",
                    scheduler.name(),
                    schedule.total_bytes()
                );
                if full.total_bytes() > budget {
                    assert_eq!(schedule.end_reason, EndReason::ByteLimitReached, "{}", scheduler.name());
                }
            }
        }
    }
}

#[test]
fn test_zero_budget_sends_nothing() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    for scheduler in all_schedulers() {
        let schedule = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), Some(0));
        assert!(schedule.is_empty(), "{}", scheduler.name());
        assert_eq!(schedule.end_reason, EndReason::ByteLimitReached);
        assert!(schedule.ledger_updates().iter().all(|u| u.bytes_delivered == 0));
    }
}

#[test]
fn test_replay_resumes_where_the_client_stopped() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();

    for scheduler in all_schedulers() {
        let name = scheduler.name();
        let full = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), None);

        for budget in [50u64, 700, 2500] {
            let empty = MemoryLedger::new();
            let first = fixture.run(scheduler.as_ref(), &window, &empty, Some(budget));
            let ledger = replayed(&empty, &first);
            let second = fixture.run(scheduler.as_ref(), &window, &ledger, None);

            assert_contiguous(name, &[&first, &second]);
            assert_eq!(first.total_bytes() + second.total_bytes(), full.total_bytes(), "{name}");
            assert_eq!(second.end_reason, EndReason::WindowDone);

            let ledger = replayed(&ledger, &second);
            let third = fixture.run(scheduler.as_ref(), &window, &ledger, None);
            assert!(third.is_empty(), "{name}: replay after full delivery sent bytes");
        }
    }
}

#[test]
fn test_cached_window_covers_its_subwindows() {
    let fixture = Fixture::open(&two_tile_layout());
    let full_window = fixture.full_window();
    let region = fixture.resolve(
        &ViewWindow::full_frame(Size::new(96, 24)).with_region(Point::new(30, 4), Size::new(40, 12)),
    );

    for scheduler in all_schedulers() {
        let full = fixture.run(scheduler.as_ref(), &full_window, &MemoryLedger::new(), None);
        let ledger = replayed(&MemoryLedger::new(), &full);
        let again = fixture.run(scheduler.as_ref(), &region, &ledger, None);
        assert!(again.is_empty(), "{}", scheduler.name());
        assert_eq!(again.end_reason, EndReason::WindowDone);
    }
}

#[test]
fn test_progression_order_does_not_change_the_bytes() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();
    for scheduler in all_schedulers() {
        let reference = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), None);
        for order in ProgressionOrder::ALL {
            let schedule = fixture.run_ordered(scheduler.as_ref(), &window, order, &MemoryLedger::new(), None);
            assert_eq!(schedule.total_bytes(), reference.total_bytes(), "{} {order}", scheduler.name());
        }
    }
}

#[test]
fn test_layers_of_a_precinct_arrive_in_order() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();
    for scheduler in all_schedulers() {
        let schedule = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), None);
        let mut last_layer: HashMap<_, u16> = HashMap::new();
        for chunk in &schedule.chunks {
            let previous = last_layer.insert(chunk.precinct, chunk.layer).unwrap_or(0);
            assert!(previous <= chunk.layer, "{}", scheduler.name());
        }
    }
}

#[test]
fn test_header_kinds() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    for scheduler in all_schedulers() {
        let schedule = fixture.run(scheduler.as_ref(), &window, &MemoryLedger::new(), None);
        let stored = schedule
            .chunks
            .iter()
            .any(|c| matches!(c.payload, ChunkPayload::StoredHeader { .. }));
        let encoded = schedule
            .chunks
            .iter()
            .any(|c| matches!(c.payload, ChunkPayload::EncodedHeader { .. }));
        if scheduler.name() == "wsf" {
            assert!(stored && !encoded);
        } else {
            assert!(encoded && !stored, "{}", scheduler.name());
        }
    }
}

// =============================================================================
// WSF
// =============================================================================

fn stored_bytes(fixture: &Fixture, layers: u16) -> u64 {
    let window = fixture.full_window();
    Resolver::new(&fixture.codestream)
        .relevant_precincts(&window, ProgressionOrder::Trcp)
        .iter()
        .map(|p| {
            (0..layers)
                .filter_map(|l| fixture.store.packet_length(p.id, l).supported())
                .sum::<u64>()
        })
        .sum()
}

#[test]
fn test_wsf_sends_every_stored_packet() {
    let fixture = Fixture::open(&two_tile_layout());
    let schedule = fixture.run(&Wsf::default(), &fixture.full_window(), &MemoryLedger::new(), None);
    assert_eq!(schedule.total_bytes(), stored_bytes(&fixture, 3));
}

#[test]
fn test_wsf_embedded_slopes() {
    let mut layout = two_tile_layout();
    layout.layer_slopes = Some(vec![60000, 30000, 1000]);
    let fixture = Fixture::open(&layout);
    let schedule = fixture.run(&Wsf::default(), &fixture.full_window(), &MemoryLedger::new(), None);
    assert_eq!(schedule.total_bytes(), stored_bytes(&fixture, 3));
}

#[test]
fn test_wsf_layer_limit() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.resolve(&ViewWindow::full_frame(Size::new(192, 48)).with_layers(1));
    let schedule = fixture.run(&Wsf::default(), &window, &MemoryLedger::new(), None);
    assert!(schedule.chunks.iter().all(|c| c.layer == 0));
    assert_eq!(schedule.total_bytes(), stored_bytes(&fixture, 1));
}

#[test]
fn test_wsf_all_priority_layers_follow_precinct_order() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let wsf = Wsf::default().with_priority_layers(3);
    let schedule = fixture.run(&wsf, &window, &MemoryLedger::new(), None);

    let mut runs = Vec::new();
    for chunk in &schedule.chunks {
        if runs.last() != Some(&chunk.precinct) {
            runs.push(chunk.precinct);
        }
    }
    let expected: Vec<_> = Resolver::new(&fixture.codestream)
        .relevant_precincts(&window, ProgressionOrder::Trcp)
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(runs, expected);
}

#[test]
fn test_wsf_first_layers_lead() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    // No small-layer carrying, so the priority phase is exactly layer 0
    let wsf = Wsf::default().with_min_payload(0);
    let schedule = fixture.run(&wsf, &window, &MemoryLedger::new(), None);
    let precincts = Resolver::new(&fixture.codestream)
        .relevant_precincts(&window, ProgressionOrder::Trcp)
        .len();

    let first_later = schedule.chunks.iter().position(|c| c.layer > 0).unwrap();
    let last_first = schedule.chunks.iter().rposition(|c| c.layer == 0).unwrap();
    assert!(last_first < first_later);

    let with_layer_zero: HashSet<_> = schedule
        .chunks
        .iter()
        .filter(|c| c.layer == 0)
        .map(|c| c.precinct)
        .collect();
    assert_eq!(with_layer_zero.len(), precincts);
}

#[test]
fn test_wsf_without_packet_index() {
    let fixture = Fixture::open(&two_tile_layout());
    let store = ModelStore::new(Arc::clone(&fixture.codestream))
        .unwrap()
        .with_packet_index(false);
    let fixture = fixture.with_store(store);
    let schedule = fixture.run(&Wsf::default(), &fixture.full_window(), &MemoryLedger::new(), None);
    assert!(schedule.is_empty());
    assert_eq!(schedule.end_reason, EndReason::WindowDone);
}

/// Index of the run of same-precinct chunks each precinct layer starts in.
fn layer_runs(schedule: &Schedule) -> HashMap<(InClassId, u16), usize> {
    let mut runs = HashMap::new();
    let mut run = 0;
    for (i, chunk) in schedule.chunks.iter().enumerate() {
        if i > 0 && schedule.chunks[i - 1].precinct != chunk.precinct {
            run += 1;
        }
        runs.entry((chunk.precinct, chunk.layer)).or_insert(run);
    }
    runs
}

#[test]
fn test_wsf_small_layer_rides_with_the_next() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    // Layer 0 bodies are too small to go out alone
    let packets = FixedPackets::new(&[4, 40, 40]);

    let schedule = fixture.run_with(&Wsf::default(), &window, &fixture.store, &packets, &MemoryLedger::new(), None);
    assert_eq!(schedule.total_bytes(), precincts.len() as u64 * packets.precinct_bytes());
    let runs = layer_runs(&schedule);
    for p in &precincts {
        assert_eq!(runs[&(p.id, 0)], runs[&(p.id, 1)], "precinct {}", p.id);
    }

    // Without the minimum, every first layer goes before any second one
    let wsf = Wsf::default().with_min_payload(0);
    let schedule = fixture.run_with(&wsf, &window, &fixture.store, &packets, &MemoryLedger::new(), None);
    let runs = layer_runs(&schedule);
    assert!(precincts.iter().any(|p| runs[&(p.id, 0)] != runs[&(p.id, 1)]));
}

#[test]
fn test_wsf_small_final_layer_is_sent() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    let packets = FixedPackets::new(&[40, 40, 3]);

    let schedule = fixture.run_with(&Wsf::default(), &window, &fixture.store, &packets, &MemoryLedger::new(), None);
    let last_bodies: Vec<u64> = schedule
        .chunks
        .iter()
        .filter(|c| c.layer == 2 && !c.payload.is_header())
        .map(|c| c.end() - c.data_bin_offset)
        .collect();
    assert_eq!(last_bodies, vec![3; precincts.len()]);

    // Under a small budget the short tail still goes out and nothing starves
    let mut ledger = MemoryLedger::new();
    let mut responses = Vec::new();
    loop {
        let schedule = fixture.run_with(&Wsf::default(), &window, &fixture.store, &packets, &ledger, Some(45));
        assert!(!schedule.is_empty(), "delivery stalled after {} responses", responses.len());
        ledger = replayed(&ledger, &schedule);
        let done = schedule.end_reason == EndReason::WindowDone;
        responses.push(schedule);
        if done {
            break;
        }
        assert!(responses.len() < 1000);
    }
    let delivered: u64 = responses.iter().map(Schedule::total_bytes).sum();
    assert_eq!(delivered, precincts.len() as u64 * packets.precinct_bytes());
    let refs: Vec<&Schedule> = responses.iter().collect();
    assert_contiguous("wsf", &refs);
}

#[test]
fn test_wsf_covered_precincts_refine_first() {
    let fixture = Fixture::open(&two_tile_layout());
    // All of tile 0 and a single column of tile 1
    let window = fixture.resolve(
        &ViewWindow::full_frame(Size::new(192, 48)).with_region(Point::new(0, 0), Size::new(97, 48)),
    );
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    assert!(precincts.iter().any(|p| p.overlap < 0.1));

    let wsf = Wsf::default().with_min_payload(0);
    let slope = estimated_layer_slopes(3)[1];
    let second_slab: HashMap<InClassId, usize> = precincts
        .iter()
        .map(|p| (p.id, wsf.slab(wsf.window_scaling_factor(p.overlap, 1.0), slope)))
        .collect();

    let schedule = fixture.run(&wsf, &window, &MemoryLedger::new(), None);
    let mut first_second = HashMap::new();
    for (i, chunk) in schedule.chunks.iter().enumerate() {
        if chunk.layer == 1 {
            first_second.entry(chunk.precinct).or_insert(i);
        }
    }

    let mut pairs = 0;
    for a in &precincts {
        for b in &precincts {
            if second_slab[&a.id] > second_slab[&b.id] {
                pairs += 1;
                assert!(
                    first_second[&a.id] < first_second[&b.id],
                    "{} (overlap {}) refined after {} (overlap {})",
                    a.id,
                    a.overlap,
                    b.id,
                    b.overlap
                );
            }
        }
    }
    assert!(pairs > 0);
}

// =============================================================================
// CPI
// =============================================================================

/// Layers each block contributes to, with the passes it contributes.
fn contributions(layers: &[LayerPlan], band: usize, block: usize) -> Vec<(usize, Range<u16>)> {
    layers
        .iter()
        .enumerate()
        .filter_map(|(l, plan)| {
            let range = plan.passes[band][block].clone();
            (!range.is_empty()).then_some((l, range))
        })
        .collect()
}

#[test]
fn test_cpi_per_pass_layers() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();
    let cpi = Cpi::new(CpiVariant::PerPass).with_weights(SubbandWeights::none());

    for p in Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp) {
        let precinct = fixture.codestream.precinct(p.id).unwrap();
        let synthesized = cpi.synthesize(&fixture.store, precinct);
        let layers = synthesized.num_layers() as usize;
        let mut max_passes = 0;

        for (b, grid) in synthesized.grids.iter().enumerate() {
            for blk in 0..grid.num_blocks() as usize {
                let block = BlockRef::new(grid.band, blk as u32 / grid.cols, blk as u32 % grid.cols);
                let passes = fixture.store.coding_passes(p.id, block);
                max_passes = max_passes.max(passes);

                let contributed = contributions(&synthesized.layers, b, blk);
                assert_eq!(contributed.len(), passes as usize);
                for (u, (layer, range)) in contributed.iter().enumerate() {
                    assert_eq!(*range, u as u16..u as u16 + 1);
                    // Consecutive layers, ending together at the last one
                    assert_eq!(*layer, layers - passes as usize + u);
                }
            }
        }
        assert_eq!(layers, max_passes as usize);
    }
}

#[test]
fn test_cpi_single_is_one_layer() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let cpi = Cpi::new(CpiVariant::Single);
    for p in Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp) {
        let precinct = fixture.codestream.precinct(p.id).unwrap();
        assert!(cpi.synthesize(&fixture.store, precinct).num_layers() <= 1);
    }

    let schedule = fixture.run(&cpi, &window, &MemoryLedger::new(), None);
    assert!(schedule.chunks.iter().all(|c| c.layer == 0));
}

#[test]
fn test_cpi_first_layers_match_contributions() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let cpi = Cpi::new(CpiVariant::PerBitPlane);
    for p in Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp) {
        let precinct = fixture.codestream.precinct(p.id).unwrap();
        let synthesized = cpi.synthesize(&fixture.store, precinct);
        let first = synthesized.first_layers();
        for (b, grid) in synthesized.grids.iter().enumerate() {
            for blk in 0..grid.num_blocks() as usize {
                let contributed = contributions(&synthesized.layers, b, blk);
                if let Some((layer, _)) = contributed.first() {
                    assert_eq!(first[b][blk], Some(*layer as u16));
                }
            }
        }
    }
}

#[test]
fn test_synthesized_layer_limit() {
    let fixture = Fixture::open(&color_layout());
    let limited = fixture.resolve(&ViewWindow::full_frame(Size::new(128, 128)).with_layers(1));
    let full = fixture.full_window();
    for scheduler in [
        Box::new(Cpi::new(CpiVariant::PerPass)) as Box<dyn Scheduler>,
        Box::new(Cord::new()),
    ] {
        let schedule = fixture.run(scheduler.as_ref(), &limited, &MemoryLedger::new(), None);
        assert!(!schedule.is_empty());
        assert!(schedule.chunks.iter().all(|c| c.layer == 0), "{}", scheduler.name());
        let everything = fixture.run(scheduler.as_ref(), &full, &MemoryLedger::new(), None);
        assert!(schedule.total_bytes() < everything.total_bytes());
    }
}

// =============================================================================
// CoRD
// =============================================================================

#[test]
fn test_cord_curves_are_monotonic_after_lifting() {
    for class in [BandClass::LowLow, BandClass::Mixed, BandClass::HighHigh] {
        for levels in 1..=5u8 {
            for resolution in 0..=levels {
                for magnitude in 1..=12u8 {
                    let mut curve = slope_curve(class, resolution, levels, magnitude);
                    let raw = curve.clone();
                    remove_liars(&mut curve);
                    assert!(curve.windows(2).all(|w| w[0] >= w[1]));
                    assert!(curve.iter().zip(&raw).all(|(lifted, raw)| lifted >= raw));
                }
            }
        }
    }
}

#[test]
fn test_cord_order_consumes_every_positive_step() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    let plan = CordPlan::build(&fixture.codestream, &precincts);

    let levels: Vec<u32> = plan.order.iter().map(|entry| entry.level).collect();
    assert_eq!(levels, (0..plan.order.len() as u32).collect::<Vec<_>>());

    let mut curves = BTreeMap::new();
    for (key, &magnitude) in &plan.buckets {
        let n_l = fixture.codestream.decomposition_levels(key.tile, key.component);
        let mut curve = slope_curve(key.class, key.resolution, n_l, magnitude);
        remove_liars(&mut curve);
        curves.insert(*key, curve);
    }
    assert_eq!(merge_block_order(&curves), plan.order);

    for (key, curve) in &curves {
        let mut next = 0u16;
        for entry in plan.order.iter().filter(|e| e.bucket == *key) {
            assert_eq!(entry.first_step, next);
            assert!(entry.steps > 0);
            next += entry.steps;
        }
        let positive = curve.iter().filter(|&&v| v > 0.0).count() as u16;
        assert_eq!(next, positive);
    }
}

#[test]
fn test_cord_precinct_layers_follow_global_levels() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    let plan = CordPlan::build(&fixture.codestream, &precincts);

    for p in &precincts {
        let precinct = fixture.codestream.precinct(p.id).unwrap();
        let (synthesized, levels) = plan.synthesize(&fixture.store, precinct);
        assert_eq!(synthesized.num_layers() as usize, levels.len());
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
        assert!(synthesized.layers.iter().all(|layer| !layer.is_empty()));

        // Each block's passes appear once, in order
        for (b, grid) in synthesized.grids.iter().enumerate() {
            for blk in 0..grid.num_blocks() as usize {
                let block = BlockRef::new(grid.band, blk as u32 / grid.cols, blk as u32 % grid.cols);
                let mut next = 0;
                for (_, range) in contributions(&synthesized.layers, b, blk) {
                    assert_eq!(range.start, next);
                    next = range.end;
                }
                assert_eq!(next, fixture.store.coding_passes(p.id, block));
            }
        }
    }
}

#[test]
fn test_cord_starts_with_the_steepest_bucket() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    let plan = CordPlan::build(&fixture.codestream, &precincts);

    let heads: Vec<_> = plan
        .buckets
        .iter()
        .map(|(key, &magnitude)| {
            let mut curve = slope_curve(key.class, key.resolution, 2, magnitude);
            remove_liars(&mut curve);
            (*key, curve[0])
        })
        .collect();
    let steepest = heads.iter().map(|&(_, head)| head).fold(0.0, f64::max);
    // Ties go to the lowest bucket key
    let expected = heads.iter().find(|&&(_, head)| head == steepest).map(|&(key, _)| key);

    let first = plan.order.first().unwrap();
    assert_eq!(Some(first.bucket), expected);
    assert_eq!(first.first_step, 0);
}

/// Global level of every pass token, keyed by block and pass.
fn token_levels(tokens: &[CodingPassId]) -> HashMap<(BlockRef, u16), u32> {
    tokens
        .iter()
        .map(|t| ((BlockRef::new(t.band, t.y_block, t.x_block), t.pass), t.level))
        .collect()
}

#[test]
fn test_cord_truncated_block_keeps_its_bit_planes() {
    let fixture = Fixture::open(&color_layout());
    let window = fixture.full_window();
    let precincts = Resolver::new(&fixture.codestream).relevant_precincts(&window, ProgressionOrder::Trcp);
    let plan = CordPlan::build(&fixture.codestream, &precincts);

    let p = precincts.iter().find(|p| p.resolution == 1).unwrap();
    let precinct = fixture.codestream.precinct(p.id).unwrap();
    let block = BlockRef::new(SubbandKind::HighLow, 0, 0);
    assert!(fixture.store.coding_passes(p.id, block) > 4);

    // Rate control stopped this block after four passes
    let truncated = TruncatedStore::new(fixture.store.clone()).truncate(p.id, block, 4);

    let full = token_levels(&plan.expand(&fixture.store, precinct));
    let cut = token_levels(&plan.expand(&truncated, precinct));
    let expected: HashMap<_, _> = full
        .into_iter()
        .filter(|&((b, pass), _)| b != block || pass < 4)
        .collect();
    assert_eq!(cut, expected);

    let schedule = fixture.run_with(&Cord::new(), &window, &truncated, &fixture.store, &MemoryLedger::new(), None);
    let full_schedule = fixture.run(&Cord::new(), &window, &MemoryLedger::new(), None);
    assert_eq!(schedule.end_reason, EndReason::WindowDone);
    assert!(schedule.total_bytes() < full_schedule.total_bytes());
    assert_contiguous("cord", &[&schedule]);
}

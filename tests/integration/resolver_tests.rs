//! Codestream addressing and window resolution.

use std::collections::BTreeSet;

use jpip_streamer::{
    ComponentRange, InClassId, Point, ProgressionOrder, Rect, Resolver, RoundDirection, Size,
    ViewWindow, WindowError,
};

use super::test_utils::{color_layout, two_tile_layout, Fixture};

#[test]
fn test_in_class_ids_round_trip_through_the_model() {
    for layout in [two_tile_layout(), color_layout()] {
        let fixture = Fixture::open(&layout);
        let cs = &fixture.codestream;
        let mut seen = BTreeSet::new();

        for t in 0..cs.num_tiles() {
            for c in 0..cs.num_components() {
                let component = cs.component(t, c).unwrap();
                for r in 0..=cs.decomposition_levels(t, c) {
                    let level = component.resolution_level(r).unwrap();
                    for p in 0..level.num_precincts() {
                        let id = cs.precinct_id(t, c, r, p).unwrap();
                        assert!(seen.insert(id), "duplicate identifier {id}");
                        assert_eq!(cs.find_tcrp(id), Some((t, c, r, p)));
                        assert_eq!(cs.precinct(id).unwrap().id(), id);
                    }
                }
            }
        }
        assert!(!seen.is_empty());
    }
}

#[test]
fn test_two_tile_layout_has_26_precincts() {
    let fixture = Fixture::open(&two_tile_layout());
    let cs = &fixture.codestream;
    let count: u32 = (0..cs.num_tiles())
        .map(|t| {
            let component = cs.component(t, 0).unwrap();
            (0..=2u8)
                .map(|r| component.resolution_level(r).unwrap().num_precincts())
                .sum::<u32>()
        })
        .sum();
    assert_eq!(count, 26);
}

#[test]
fn test_sequence_numbers_grow_with_resolution() {
    let fixture = Fixture::open(&color_layout());
    let cs = &fixture.codestream;
    for c in 0..cs.num_components() {
        let mut previous: Option<InClassId> = None;
        let component = cs.component(0, c).unwrap();
        for r in 0..=cs.decomposition_levels(0, c) {
            for p in 0..component.resolution_level(r).unwrap().num_precincts() {
                let id = cs.precinct_id(0, c, r, p).unwrap();
                if let Some(prev) = previous {
                    assert!(id > prev, "component {c}: {id} after {prev}");
                }
                previous = Some(id);
            }
        }
    }
}

#[test]
fn test_compose_decompose_bijection() {
    for num_tiles in [1u32, 2, 7] {
        for num_components in [1u16, 3] {
            for raw in 0..200u64 {
                let id = InClassId::from_raw(raw);
                let (t, c, s) = id.decompose(num_tiles, num_components);
                assert!(t < num_tiles && c < num_components);
                assert_eq!(InClassId::compose(t, c, s, num_tiles, num_components), id);
            }
        }
    }
}

#[test]
fn test_negative_identifier_is_rejected() {
    assert!(InClassId::try_from(-1i64).is_err());
    assert_eq!(InClassId::try_from(5i64).unwrap(), InClassId::from_raw(5));
}

#[test]
fn test_every_order_selects_the_same_precincts() {
    let fixture = Fixture::open(&color_layout());
    let resolver = Resolver::new(&fixture.codestream);
    let window = fixture.resolve(
        &ViewWindow::full_frame(Size::new(128, 128))
            .with_region(Point::new(40, 24), Size::new(50, 30))
            .with_components(ComponentRange::new(1, 2)),
    );

    let reference: BTreeSet<InClassId> = resolver
        .relevant_precincts_by_resolution(&window)
        .into_iter()
        .flatten()
        .map(|p| p.id)
        .collect();
    assert!(!reference.is_empty());

    for order in ProgressionOrder::ALL {
        let list = resolver.relevant_precincts(&window, order);
        assert_eq!(list.len(), reference.len(), "{order}: duplicates or gaps");
        let set: BTreeSet<InClassId> = list.iter().map(|p| p.id).collect();
        assert_eq!(set, reference, "{order}");
        assert!(list.iter().all(|p| p.component >= 1));
    }
}

#[test]
fn test_relevant_precincts_meet_the_region() {
    let fixture = Fixture::open(&two_tile_layout());
    let resolver = Resolver::new(&fixture.codestream);
    let window = fixture.resolve(
        &ViewWindow::full_frame(Size::new(192, 48)).with_region(Point::new(100, 0), Size::new(20, 48)),
    );
    let list = resolver.relevant_precincts(&window, ProgressionOrder::Tcrp);
    assert!(!list.is_empty());
    assert!(list.iter().all(|p| p.tile == 1));
    assert!(list.iter().all(|p| p.overlap > 0.0 && p.overlap <= 1.0));
}

#[test]
fn test_frame_rounding() {
    let fixture = Fixture::open(&two_tile_layout());

    let down = fixture.resolve(&ViewWindow::full_frame(Size::new(100, 30)));
    assert_eq!(down.discard_levels, 0);
    assert_eq!(down.frame, Size::new(192, 48));
    assert!(down.scale_factor() < 1.0);

    let up = fixture.resolve(&ViewWindow::full_frame(Size::new(100, 30)).with_round(RoundDirection::Up));
    assert_eq!(up.discard_levels, 1);
    assert_eq!(up.frame, Size::new(96, 24));

    let exact = fixture.resolve(&ViewWindow::full_frame(Size::new(48, 12)));
    assert_eq!(exact.discard_levels, 2);
    assert_eq!(exact.reference_region, Rect::new(0, 0, 192, 48));
    assert_eq!(exact.scale_factor(), 1.0);
}

#[test]
fn test_window_errors() {
    let fixture = Fixture::open(&two_tile_layout());
    let resolver = Resolver::new(&fixture.codestream);

    let components = ViewWindow::full_frame(Size::new(192, 48)).with_components(ComponentRange::new(0, 1));
    assert!(matches!(
        resolver.resolve_window(&components),
        Err(WindowError::InvalidComponentRange { .. })
    ));

    let empty = ViewWindow::full_frame(Size::new(192, 0));
    assert!(matches!(
        resolver.resolve_window(&empty),
        Err(WindowError::EmptyFrame { .. })
    ));
}

#[test]
fn test_layer_limit_is_clamped() {
    let fixture = Fixture::open(&two_tile_layout());
    let window = fixture.resolve(&ViewWindow::full_frame(Size::new(192, 48)).with_layers(10));
    assert_eq!(window.layers, 3);
    assert_eq!(window.requested_layers, Some(10));
}

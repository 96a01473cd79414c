use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use vmp_core::{AssetId, Priority, Rect, ViewportConfig};
use vmp_viewport::{FixedBounds, ViewportScheduler};

const SCREEN: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 1000.0,
    height: 800.0,
};

fn tile(y: f64) -> Rect {
    Rect::new(100.0, y, 200.0, 150.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_admitted_once_at_first_overlapping_viewport(
        positions in prop::collection::vec(0.0f64..20_000.0, 1..40),
        scrolls in prop::collection::vec(0.0f64..20_000.0, 1..12),
        lookahead in 0.0f64..2.0,
    ) {
        let scheduler = ViewportScheduler::new(ViewportConfig { lookahead_screens: lookahead });
        let entries: Vec<_> = positions
            .iter()
            .map(|y| {
                let id = AssetId::new();
                let (registration, admission) =
                    scheduler.register(id, Arc::new(FixedBounds(tile(*y))), Priority::Viewport);
                (id, *y, registration, admission)
            })
            .collect();

        let mut admitted = HashSet::new();
        for scroll in &scrolls {
            let viewport = Rect { y: *scroll, ..SCREEN };
            let area = viewport.expand_by_screens(lookahead);
            let now = scheduler.set_viewport(viewport);

            for id in &now {
                prop_assert!(admitted.insert(*id), "admitted twice");
            }
            for (id, y, _, _) in &entries {
                if !admitted.contains(id) || now.contains(id) {
                    let expected = area.intersects(&tile(*y));
                    prop_assert_eq!(now.contains(id), expected);
                }
            }
        }

        let stats = scheduler.stats();
        prop_assert_eq!(stats.pending, entries.len() - admitted.len());
        prop_assert_eq!(stats.admitted_total, admitted.len() as u64);
        for (id, _, _, _) in &entries {
            prop_assert_eq!(scheduler.is_pending(*id), !admitted.contains(id));
        }
    }
}

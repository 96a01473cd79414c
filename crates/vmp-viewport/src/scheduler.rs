//! Viewport scheduler
//!
//! The registration table is mutated only through `register`/`unregister`
//! and the evaluation calls. Bounds providers are invoked without holding
//! the table lock, so a provider may safely call back into the scheduler.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use vmp_core::{AssetId, Priority, Rect, ViewportConfig};

/// Supplies the current on-screen bounds of a placeholder
///
/// Returns `None` while the placeholder has no layout (e.g. not attached yet).
pub trait BoundsProvider: Send + Sync {
    /// Current bounds in viewport coordinates
    fn bounds(&self) -> Option<Rect>;
}

/// Bounds that never move (static layouts, tests)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBounds(pub Rect);

impl BoundsProvider for FixedBounds {
    fn bounds(&self) -> Option<Rect> {
        Some(self.0)
    }
}

impl<F> BoundsProvider for F
where
    F: Fn() -> Option<Rect> + Send + Sync,
{
    fn bounds(&self) -> Option<Rect> {
        self()
    }
}

/// Why an entry was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionReason {
    /// Registered with immediate priority
    Immediate,
    /// Bounds entered the expanded viewport
    Visible,
    /// Hover hint for a hover-priority entry
    Hover,
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Entries waiting for admission
    pub pending: usize,
    /// Admissions issued so far
    pub admitted_total: u64,
    /// Entries dropped before admission (unregistered or replaced)
    pub discarded_total: u64,
}

struct Entry {
    generation: u64,
    priority: Priority,
    bounds: Arc<dyn BoundsProvider>,
    signal: oneshot::Sender<AdmissionReason>,
}

#[derive(Default)]
struct Table {
    viewport: Option<Rect>,
    entries: HashMap<AssetId, Entry>,
    next_generation: u64,
    stats: SchedulerStats,
}

impl Table {
    fn admit(&mut self, id: AssetId, reason: AdmissionReason) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        // The receiver may be gone if its owner already tore down.
        let _ = entry.signal.send(reason);
        self.stats.admitted_total += 1;
        tracing::debug!(asset = %id, ?reason, "asset admitted");
        true
    }

    fn remove_generation(&mut self, id: AssetId, generation: u64) -> bool {
        let current = matches!(self.entries.get(&id), Some(e) if e.generation == generation);
        if current {
            self.entries.remove(&id);
            self.stats.discarded_total += 1;
        }
        current
    }
}

/// Admission order decisions for registered placeholders
#[derive(Clone)]
pub struct ViewportScheduler {
    config: ViewportConfig,
    table: Arc<Mutex<Table>>,
}

impl std::fmt::Debug for ViewportScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportScheduler")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ViewportScheduler {
    /// Create a scheduler with no known viewport yet
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    /// Register a placeholder.
    ///
    /// Re-registering an id replaces the previous entry: the old admission
    /// resolves to `None` and the old [`Registration`] no longer affects the
    /// table. Immediate priority is admitted before this call returns.
    pub fn register(
        &self,
        id: AssetId,
        bounds: Arc<dyn BoundsProvider>,
        priority: Priority,
    ) -> (Registration, Admission) {
        let (tx, rx) = oneshot::channel();

        let (generation, viewport) = {
            let mut table = self.table.lock();
            table.next_generation += 1;
            let generation = table.next_generation;

            if let Some(previous) = table.entries.insert(
                id,
                Entry {
                    generation,
                    priority,
                    bounds: Arc::clone(&bounds),
                    signal: tx,
                },
            ) {
                table.stats.discarded_total += 1;
                tracing::debug!(asset = %id, old = previous.generation, "registration replaced");
            }

            if priority == Priority::Immediate {
                table.admit(id, AdmissionReason::Immediate);
            }
            (generation, table.viewport)
        };

        // Placeholders already in view do not wait for the next scroll.
        if priority != Priority::Immediate {
            if let Some(viewport) = viewport {
                if self.is_visible(&viewport, bounds.as_ref()) {
                    self.admit_if_current(id, generation, AdmissionReason::Visible);
                }
            }
        }

        let registration = Registration {
            id,
            generation,
            table: Arc::downgrade(&self.table),
        };
        (registration, Admission { rx })
    }

    /// Update the viewport and admit every entry that became visible
    pub fn set_viewport(&self, viewport: Rect) -> Vec<AssetId> {
        self.table.lock().viewport = Some(viewport);
        self.reevaluate()
    }

    /// Re-run the admission rule, e.g. after a layout change
    pub fn reevaluate(&self) -> Vec<AssetId> {
        let (viewport, candidates) = {
            let table = self.table.lock();
            let Some(viewport) = table.viewport else {
                return Vec::new();
            };
            let candidates: Vec<(AssetId, u64, Arc<dyn BoundsProvider>)> = table
                .entries
                .iter()
                .map(|(id, e)| (*id, e.generation, Arc::clone(&e.bounds)))
                .collect();
            (viewport, candidates)
        };

        candidates
            .into_iter()
            .filter(|(_, _, bounds)| self.is_visible(&viewport, bounds.as_ref()))
            .filter(|(id, generation, _)| {
                self.admit_if_current(*id, *generation, AdmissionReason::Visible)
            })
            .map(|(id, _, _)| id)
            .collect()
    }

    /// Hover hint. Admits a pending hover-priority entry; no-op otherwise.
    pub fn notify_hover(&self, id: AssetId) -> bool {
        let mut table = self.table.lock();
        let hoverable = matches!(table.entries.get(&id), Some(e) if e.priority == Priority::Hover);
        hoverable && table.admit(id, AdmissionReason::Hover)
    }

    /// Whether an id is registered and waiting
    #[must_use]
    pub fn is_pending(&self, id: AssetId) -> bool {
        self.table.lock().entries.contains_key(&id)
    }

    /// Get scheduler statistics
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let table = self.table.lock();
        SchedulerStats {
            pending: table.entries.len(),
            ..table.stats
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    fn is_visible(&self, viewport: &Rect, bounds: &dyn BoundsProvider) -> bool {
        let expanded = viewport.expand_by_screens(self.config.lookahead_screens);
        bounds.bounds().is_some_and(|b| expanded.intersects(&b))
    }

    fn admit_if_current(&self, id: AssetId, generation: u64, reason: AdmissionReason) -> bool {
        let mut table = self.table.lock();
        let current = matches!(table.entries.get(&id), Some(e) if e.generation == generation);
        current && table.admit(id, reason)
    }
}

/// Keeps a registration alive; dropping it unregisters a pending entry
#[must_use = "dropping the registration discards the pending entry"]
#[derive(Debug)]
pub struct Registration {
    id: AssetId,
    generation: u64,
    table: Weak<Mutex<Table>>,
}

impl Registration {
    #[inline]
    #[must_use]
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Discard the entry if it is still pending.
    ///
    /// Returns `true` if a pending entry was removed. Work that was already
    /// admitted is not affected.
    pub fn unregister(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        // Make a second call (explicit + drop) inert.
        self.table = Weak::new();
        let removed = table.lock().remove_generation(self.id, self.generation);
        if removed {
            tracing::trace!(asset = %self.id, "pending registration discarded");
        }
        removed
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolves when the scheduler admits the entry
#[derive(Debug)]
pub struct Admission {
    rx: oneshot::Receiver<AdmissionReason>,
}

impl Admission {
    /// Wait for admission; `None` if the entry was discarded or replaced
    pub async fn admitted(self) -> Option<AdmissionReason> {
        self.rx.await.ok()
    }

    /// Check without waiting
    pub fn try_admitted(&mut self) -> Option<AdmissionReason> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    fn scheduler() -> ViewportScheduler {
        ViewportScheduler::new(ViewportConfig::default())
    }

    #[test]
    fn immediate_is_admitted_inside_register() {
        let scheduler = scheduler();
        let (_reg, mut admission) = scheduler.register(
            AssetId::new(),
            Arc::new(FixedBounds(Rect::new(0.0, 50_000.0, 10.0, 10.0))),
            Priority::Immediate,
        );
        assert_eq!(admission.try_admitted(), Some(AdmissionReason::Immediate));
        assert_eq!(scheduler.stats().pending, 0);
        assert_eq!(scheduler.stats().admitted_total, 1);
    }

    #[test]
    fn viewport_priority_waits_for_visibility() {
        let scheduler = scheduler();
        let id = AssetId::new();
        let (_reg, mut admission) = scheduler.register(
            id,
            Arc::new(FixedBounds(Rect::new(0.0, 3000.0, 100.0, 100.0))),
            Priority::Viewport,
        );
        assert!(admission.try_admitted().is_none());
        assert!(scheduler.set_viewport(viewport()).is_empty());
        assert!(scheduler.is_pending(id));

        // Scroll so the placeholder is within one screen of lookahead.
        let admitted = scheduler.set_viewport(Rect::new(0.0, 1500.0, 1000.0, 800.0));
        assert_eq!(admitted, vec![id]);
        assert_eq!(admission.try_admitted(), Some(AdmissionReason::Visible));
    }

    #[test]
    fn lookahead_admits_slightly_offscreen() {
        let scheduler = scheduler();
        scheduler.set_viewport(viewport());
        // One screen below the fold.
        let (_reg, mut admission) = scheduler.register(
            AssetId::new(),
            Arc::new(FixedBounds(Rect::new(0.0, 1200.0, 100.0, 100.0))),
            Priority::None,
        );
        assert_eq!(admission.try_admitted(), Some(AdmissionReason::Visible));
    }

    #[test]
    fn zero_lookahead_requires_real_visibility() {
        let scheduler = ViewportScheduler::new(ViewportConfig {
            lookahead_screens: 0.0,
        });
        scheduler.set_viewport(viewport());
        let (_reg, mut admission) = scheduler.register(
            AssetId::new(),
            Arc::new(FixedBounds(Rect::new(0.0, 1200.0, 100.0, 100.0))),
            Priority::Viewport,
        );
        assert!(admission.try_admitted().is_none());
    }

    #[test]
    fn admitted_entry_is_never_requeued() {
        let scheduler = scheduler();
        let id = AssetId::new();
        let (_reg, _admission) =
            scheduler.register(id, Arc::new(FixedBounds(Rect::new(0.0, 0.0, 10.0, 10.0))), Priority::Viewport);

        assert_eq!(scheduler.set_viewport(viewport()), vec![id]);
        // Toggle visibility back and forth.
        assert!(scheduler.set_viewport(Rect::new(0.0, 90_000.0, 10.0, 10.0)).is_empty());
        assert!(scheduler.set_viewport(viewport()).is_empty());
        assert_eq!(scheduler.stats().admitted_total, 1);
    }

    #[tokio::test]
    async fn unregister_before_admission_discards_silently() {
        let scheduler = scheduler();
        let id = AssetId::new();
        let (reg, admission) = scheduler.register(
            id,
            Arc::new(FixedBounds(Rect::new(0.0, 9000.0, 10.0, 10.0))),
            Priority::Viewport,
        );
        assert!(reg.unregister());
        assert!(!scheduler.is_pending(id));
        assert_eq!(admission.admitted().await, None);
        assert_eq!(scheduler.stats().discarded_total, 1);
    }

    #[test]
    fn unregister_after_admission_is_noop() {
        let scheduler = scheduler();
        let (reg, mut admission) = scheduler.register(
            AssetId::new(),
            Arc::new(FixedBounds(Rect::new(0.0, 0.0, 10.0, 10.0))),
            Priority::Immediate,
        );
        assert!(admission.try_admitted().is_some());
        assert!(!reg.unregister());
        assert_eq!(scheduler.stats().discarded_total, 0);
    }

    #[tokio::test]
    async fn reregistration_replaces_without_leaking() {
        let scheduler = scheduler();
        let id = AssetId::new();
        let far = Arc::new(FixedBounds(Rect::new(0.0, 9000.0, 10.0, 10.0)));

        let (old_reg, old_admission) = scheduler.register(id, far.clone(), Priority::Viewport);
        let (_new_reg, mut new_admission) = scheduler.register(id, far, Priority::Viewport);

        assert_eq!(old_admission.admitted().await, None);
        assert_eq!(scheduler.stats().pending, 1);

        // The stale guard must not remove the replacement.
        drop(old_reg);
        assert!(scheduler.is_pending(id));

        scheduler.set_viewport(Rect::new(0.0, 8800.0, 1000.0, 800.0));
        assert_eq!(new_admission.try_admitted(), Some(AdmissionReason::Visible));
    }

    #[test]
    fn hover_hint_only_applies_to_hover_priority() {
        let scheduler = scheduler();
        let far = Arc::new(FixedBounds(Rect::new(0.0, 9000.0, 10.0, 10.0)));
        let hover_id = AssetId::new();
        let view_id = AssetId::new();
        let (_a, mut hover) = scheduler.register(hover_id, far.clone(), Priority::Hover);
        let (_b, mut view) = scheduler.register(view_id, far, Priority::Viewport);

        assert!(scheduler.notify_hover(hover_id));
        assert!(!scheduler.notify_hover(view_id));
        assert!(!scheduler.notify_hover(hover_id));

        assert_eq!(hover.try_admitted(), Some(AdmissionReason::Hover));
        assert!(view.try_admitted().is_none());
    }

    #[test]
    fn unlaid_out_placeholder_waits() {
        let scheduler = scheduler();
        scheduler.set_viewport(viewport());
        let y = Arc::new(AtomicU64::new(u64::MAX));
        let provider_y = Arc::clone(&y);
        let provider = move || {
            let y = provider_y.load(Ordering::SeqCst);
            #[allow(clippy::cast_precision_loss)]
            let top = y as f64;
            (y != u64::MAX).then(|| Rect::new(0.0, top, 10.0, 10.0))
        };
        let (_reg, mut admission) =
            scheduler.register(AssetId::new(), Arc::new(provider), Priority::Viewport);
        assert!(admission.try_admitted().is_none());

        y.store(100, Ordering::SeqCst);
        assert_eq!(scheduler.reevaluate().len(), 1);
        assert!(admission.try_admitted().is_some());
    }
}

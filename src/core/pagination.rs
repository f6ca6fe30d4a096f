use crate::domain::model::CandidateResult;

pub const REVEAL_WINDOW: usize = 20;

/// Reports the reveal sentinel entering the viewport. Implemented by whatever renders
/// the list; the controller never looks at a rendering surface itself.
pub trait VisibilityObserver {
    /// True if the sentinel became visible since the previous call.
    fn sentinel_entered(&mut self) -> bool;
}

/// 逐步揭露已取得的結果：初始一個視窗，之後每次再加一個視窗
#[derive(Debug, Clone)]
pub struct RevealController {
    window: usize,
    visible_count: usize,
    total: usize,
}

impl Default for RevealController {
    fn default() -> Self {
        Self::with_window(REVEAL_WINDOW)
    }
}

impl RevealController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            visible_count: 0,
            total: 0,
        }
    }

    /// Starts over for a new full result set.
    pub fn reset(&mut self, total: usize) {
        self.total = total;
        self.visible_count = self.window.min(total);
    }

    /// Follows a result set that is still growing. The first window fills up as results
    /// arrive; anything past it waits for `reveal_more`.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.visible_count = self
            .visible_count
            .max(self.window.min(total))
            .min(total);
    }

    /// Returns whether anything new became visible.
    pub fn reveal_more(&mut self) -> bool {
        let next = (self.visible_count + self.window).min(self.total);
        if next == self.visible_count {
            return false;
        }
        tracing::debug!("Revealing results {}..{}", self.visible_count, next);
        self.visible_count = next;
        true
    }

    pub fn poll(&mut self, observer: &mut dyn VisibilityObserver) -> bool {
        observer.sentinel_entered() && self.reveal_more()
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.visible_count < self.total
    }

    /// 篩選只作用在前 `visible_count` 筆未篩選結果上，不改變 `visible_count`
    pub fn visible<'a>(
        &self,
        ranked: &[&'a CandidateResult],
        qualified_filter: Option<bool>,
    ) -> Vec<&'a CandidateResult> {
        ranked
            .iter()
            .take(self.visible_count)
            .filter(|c| qualified_filter.map_or(true, |q| c.qualified == q))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_support::candidate;
    use crate::core::store::ResultStore;

    struct ScriptedObserver {
        signals: Vec<bool>,
    }

    impl VisibilityObserver for ScriptedObserver {
        fn sentinel_entered(&mut self) -> bool {
            if self.signals.is_empty() {
                false
            } else {
                self.signals.remove(0)
            }
        }
    }

    #[test]
    fn test_reset_and_reveal_clamp_to_total() {
        let mut reveal = RevealController::new();
        reveal.reset(45);
        assert_eq!(reveal.visible_count(), 20);

        assert!(reveal.reveal_more());
        assert_eq!(reveal.visible_count(), 40);
        assert!(reveal.reveal_more());
        assert_eq!(reveal.visible_count(), 45);
        assert!(!reveal.has_more());
    }

    #[test]
    fn test_reveal_more_at_maximum_is_noop() {
        let mut reveal = RevealController::new();
        reveal.reset(7);
        assert_eq!(reveal.visible_count(), 7);

        assert!(!reveal.reveal_more());
        assert_eq!(reveal.visible_count(), 7);
    }

    #[test]
    fn test_observer_and_manual_reveal_converge() {
        let mut by_observer = RevealController::new();
        let mut by_hand = RevealController::new();
        by_observer.reset(50);
        by_hand.reset(50);

        let mut observer = ScriptedObserver {
            signals: vec![true, false, true, true],
        };
        while !observer.signals.is_empty() {
            by_observer.poll(&mut observer);
        }
        while by_hand.reveal_more() {}

        assert_eq!(by_observer.visible_count(), 50);
        assert_eq!(by_observer.visible_count(), by_hand.visible_count());
    }

    #[test]
    fn test_set_total_fills_first_window_while_streaming() {
        let mut reveal = RevealController::new();
        reveal.reset(0);
        reveal.set_total(5);
        assert_eq!(reveal.visible_count(), 5);
        reveal.set_total(30);
        assert_eq!(reveal.visible_count(), 20);
        assert!(reveal.has_more());
    }

    #[test]
    fn test_filter_applies_within_visible_window() {
        let store: ResultStore = (0..30)
            .map(|i| {
                candidate(
                    &format!("c{:02}", i),
                    &format!("Name {:02}", i),
                    100.0 - i as f64,
                    i % 2 == 0,
                )
            })
            .collect();
        let ranked = store.ranked();

        let mut reveal = RevealController::new();
        reveal.reset(store.len());

        let qualified = reveal.visible(&ranked, Some(true));
        assert_eq!(qualified.len(), 10);
        assert_eq!(reveal.visible_count(), 20);
        assert_eq!(reveal.visible(&ranked, None).len(), 20);
    }
}

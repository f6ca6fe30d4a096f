use crate::core::store::ResultStore;
use crate::domain::model::CandidateResult;
use crate::utils::error::{Result, ScreenError};

pub const MAX_SELECTION: usize = 15;

/// Flags derived from the current selection, returned after every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionStatus {
    pub count: usize,
    pub can_deep_analyze: bool,
    pub can_compare: bool,
}

/// 多選狀態機；只保存候選人 id，資料本身由 `ResultStore` 擁有
///
/// Ids keep the order in which they were selected, so "the first selected candidate"
/// is well defined for comparisons.
///
/// # Panics
///
/// Every operation that receives an id panics if the id is not in the store. Callers
/// taking ids from outside check `ResultStore::contains` first.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SelectionStatus {
        SelectionStatus {
            count: self.ids.len(),
            can_deep_analyze: self.can_deep_analyze(),
            can_compare: self.can_compare(),
        }
    }

    pub fn toggle(&mut self, store: &ResultStore, id: &str) -> Result<SelectionStatus> {
        assert!(
            store.contains(id),
            "selection referenced candidate {} which is not in the result store",
            id
        );

        if let Some(position) = self.ids.iter().position(|selected| selected == id) {
            self.ids.remove(position);
            return Ok(self.status());
        }

        if self.ids.len() >= MAX_SELECTION {
            tracing::warn!(
                "⚠️ Selection limit reached ({}), {} was not selected",
                MAX_SELECTION,
                id
            );
            return Err(ScreenError::validation(format!(
                "You can select at most {} candidates",
                MAX_SELECTION
            )));
        }

        self.ids.push(id.to_string());
        Ok(self.status())
    }

    /// 清除後選取排名前 n 位；n 會被限制在 1..=候選人數，且不超過上限
    pub fn select_top_n(&mut self, store: &ResultStore, n: usize) -> SelectionStatus {
        self.ids.clear();
        if store.is_empty() {
            return self.status();
        }

        let n = n.clamp(1, store.len()).min(MAX_SELECTION);
        self.ids = store
            .ranked()
            .into_iter()
            .take(n)
            .map(|c| c.id.clone())
            .collect();
        self.status()
    }

    pub fn clear(&mut self) -> SelectionStatus {
        self.ids.clear();
        self.status()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|selected| selected == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn can_deep_analyze(&self) -> bool {
        !self.ids.is_empty()
    }

    pub fn can_compare(&self) -> bool {
        self.ids.len() >= 2
    }

    /// Selected candidates in selection order.
    pub fn resolve<'a>(&self, store: &'a ResultStore) -> Vec<&'a CandidateResult> {
        self.ids
            .iter()
            .map(|id| {
                store.get(id).unwrap_or_else(|| {
                    panic!("selected candidate {} is missing from the result store", id)
                })
            })
            .collect()
    }

    pub fn require_deep_analyze(&self) -> Result<()> {
        if self.can_deep_analyze() {
            Ok(())
        } else {
            Err(ScreenError::validation(
                "Select at least one candidate for deep analysis",
            ))
        }
    }

    pub fn require_compare(&self) -> Result<()> {
        if self.can_compare() {
            Ok(())
        } else {
            Err(ScreenError::validation(
                "Select at least two candidates to compare",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_support::candidate;

    fn store_of(count: usize) -> ResultStore {
        (0..count)
            .map(|i| candidate(&format!("c{:02}", i), &format!("Name {:02}", i), i as f64, true))
            .collect()
    }

    #[test]
    fn test_toggle_flips_membership() {
        let store = store_of(3);
        let mut selection = SelectionSet::new();

        let status = selection.toggle(&store, "c01").unwrap();
        assert_eq!(status.count, 1);
        assert!(status.can_deep_analyze);
        assert!(!status.can_compare);

        let status = selection.toggle(&store, "c01").unwrap();
        assert_eq!(status.count, 0);
        assert!(!status.can_deep_analyze);
    }

    #[test]
    fn test_toggle_beyond_limit_is_rejected_without_change() {
        let store = store_of(20);
        let mut selection = SelectionSet::new();
        for i in 0..MAX_SELECTION {
            selection.toggle(&store, &format!("c{:02}", i)).unwrap();
        }
        let before = selection.status();

        let result = selection.toggle(&store, "c19");
        assert!(result.is_err());
        assert_eq!(selection.status(), before);
        assert_eq!(selection.len(), MAX_SELECTION);
        assert!(!selection.contains("c19"));

        // 已選取的仍可取消
        let status = selection.toggle(&store, "c00").unwrap();
        assert_eq!(status.count, MAX_SELECTION - 1);
    }

    #[test]
    fn test_select_top_n_takes_highest_scores() {
        let store: ResultStore = vec![
            candidate("a", "Ana", 70.0, true),
            candidate("b", "Ben", 90.0, true),
            candidate("c", "Cy", 90.0, true),
            candidate("d", "Dee", 50.0, false),
        ]
        .into_iter()
        .collect();
        let mut selection = SelectionSet::new();
        selection.toggle(&store, "d").unwrap();

        let status = selection.select_top_n(&store, 3);
        assert_eq!(status.count, 3);
        assert_eq!(selection.ids(), &["b", "c", "a"]);
    }

    #[test]
    fn test_select_top_n_clamps() {
        let store = store_of(4);
        let mut selection = SelectionSet::new();

        assert_eq!(selection.select_top_n(&store, 0).count, 1);
        assert_eq!(selection.select_top_n(&store, 99).count, 4);

        let big = store_of(30);
        assert_eq!(selection.select_top_n(&big, 20).count, MAX_SELECTION);

        let empty = ResultStore::new();
        assert_eq!(selection.select_top_n(&empty, 5).count, 0);
    }

    #[test]
    fn test_clear_then_toggle_scenario() {
        let store = store_of(5);
        let mut selection = SelectionSet::new();
        for id in ["c00", "c01", "c02"] {
            selection.toggle(&store, id).unwrap();
        }

        selection.clear();
        let status = selection.toggle(&store, "c03").unwrap();

        assert_eq!(status.count, 1);
        assert!(!status.can_compare);
        assert!(status.can_deep_analyze);
    }

    #[test]
    fn test_resolve_preserves_selection_order() {
        let store = store_of(3);
        let mut selection = SelectionSet::new();
        selection.toggle(&store, "c02").unwrap();
        selection.toggle(&store, "c00").unwrap();

        let names: Vec<&str> = selection
            .resolve(&store)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Name 02", "Name 00"]);
    }

    #[test]
    fn test_require_guards() {
        let store = store_of(2);
        let mut selection = SelectionSet::new();
        assert!(selection.require_deep_analyze().is_err());
        selection.toggle(&store, "c00").unwrap();
        assert!(selection.require_deep_analyze().is_ok());
        assert!(selection.require_compare().is_err());
        selection.toggle(&store, "c01").unwrap();
        assert!(selection.require_compare().is_ok());
    }

    #[test]
    #[should_panic(expected = "not in the result store")]
    fn test_unknown_id_fails_fast() {
        let store = store_of(1);
        let mut selection = SelectionSet::new();
        let _ = selection.toggle(&store, "ghost");
    }
}

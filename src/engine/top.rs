// Top-K frequent error messages
use ahash::HashMap;
use serde::Serialize;

/// Number of error messages reported per snapshot
pub const TOP_ERRORS: usize = 3;

/// One entry of the frequent-errors list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopError {
    pub message: String,
    pub count: u64,
}

/// Rank a frequency table and keep at most `k` entries.
///
/// Ordered by count descending, then message ascending, so equal counts
/// always come out in the same order regardless of hash iteration order.
pub fn rank(table: &HashMap<&str, u64>, k: usize) -> Vec<TopError> {
    let mut entries: Vec<(&str, u64)> = table.iter().map(|(msg, n)| (*msg, *n)).collect();
    entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    entries
        .into_iter()
        .take(k)
        .map(|(message, count)| TopError {
            message: message.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::HashMapExt;

    fn table(entries: &[(&'static str, u64)]) -> HashMap<&'static str, u64> {
        let mut map = HashMap::new();
        for (msg, n) in entries {
            map.insert(*msg, *n);
        }
        map
    }

    #[test]
    fn test_empty_table() {
        assert!(rank(&HashMap::new(), TOP_ERRORS).is_empty());
    }

    #[test]
    fn test_fewer_than_k() {
        let top = rank(&table(&[("A", 10), ("B", 5)]), TOP_ERRORS);
        assert_eq!(
            top,
            vec![
                TopError { message: "A".into(), count: 10 },
                TopError { message: "B".into(), count: 5 },
            ]
        );
    }

    #[test]
    fn test_truncates_to_k() {
        let top = rank(
            &table(&[("a", 1), ("b", 7), ("c", 3), ("d", 9), ("e", 2)]),
            TOP_ERRORS,
        );
        let messages: Vec<&str> = top.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["d", "b", "c"]);
    }

    #[test]
    fn test_ties_break_on_message() {
        let t = table(&[("timeout", 4), ("disk full", 4), ("auth failed", 4), ("oom", 4)]);
        let first = rank(&t, TOP_ERRORS);
        let messages: Vec<&str> = first.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["auth failed", "disk full", "oom"]);

        // Same table, same answer
        assert_eq!(rank(&t, TOP_ERRORS), first);
    }
}

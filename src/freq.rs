use std::collections::HashMap;
use std::hash::Hash;

/// Field of a `(key, count)` pair to order and bound by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Key,
    Count,
}

/// Options for [`count`]. Minimum/maximum are independent optional
/// inclusive filters; `reverse = true` sorts descending.
#[derive(Debug, Clone)]
pub struct CountOptions<K> {
    pub order_by: OrderBy,
    pub min_key: Option<K>,
    pub max_key: Option<K>,
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

impl<K> Default for CountOptions<K> {
    fn default() -> Self {
        Self {
            order_by: OrderBy::Count,
            min_key: None,
            max_key: None,
            min_count: None,
            max_count: None,
            limit: None,
            reverse: true,
        }
    }
}

impl<K> CountOptions<K> {
    /// Most frequent first, the word-ranking configuration
    pub fn by_count() -> Self {
        Self::default()
    }

    /// Ascending key order, the chronological date-count configuration
    pub fn by_key_ascending() -> Self {
        Self {
            order_by: OrderBy::Key,
            reverse: false,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_count_bounds(mut self, minimum: Option<u64>, maximum: Option<u64>) -> Self {
        self.min_count = minimum;
        self.max_count = maximum;
        self
    }

    pub fn with_key_bounds(mut self, minimum: Option<K>, maximum: Option<K>) -> Self {
        self.min_key = minimum;
        self.max_key = maximum;
        self
    }
}

/// Counts occurrences of each distinct item and returns `(item, count)`
/// pairs filtered, sorted, and truncated per the options. The sort is
/// stable: pairs that compare equal on the selected field keep the order
/// in which their items first appeared in the input.
pub fn count<K, I>(items: I, options: &CountOptions<K>) -> Vec<(K, u64)>
where
    K: Eq + Hash + Ord + Clone,
    I: IntoIterator<Item = K>,
{
    let mut counts: HashMap<K, u64> = HashMap::new();
    let mut first_seen: Vec<K> = Vec::new();

    for item in items {
        match counts.get_mut(&item) {
            Some(n) => *n += 1,
            None => {
                counts.insert(item.clone(), 1);
                first_seen.push(item);
            }
        }
    }

    let mut pairs: Vec<(K, u64)> = first_seen
        .into_iter()
        .map(|key| {
            let n = counts.remove(&key).unwrap_or(0);
            (key, n)
        })
        .collect();

    pairs.retain(|(key, n)| {
        options.min_key.as_ref().map_or(true, |m| key >= m)
            && options.max_key.as_ref().map_or(true, |m| key <= m)
            && options.min_count.map_or(true, |m| *n >= m)
            && options.max_count.map_or(true, |m| *n <= m)
    });

    match (options.order_by, options.reverse) {
        (OrderBy::Key, false) => pairs.sort_by(|a, b| a.0.cmp(&b.0)),
        (OrderBy::Key, true) => pairs.sort_by(|a, b| b.0.cmp(&a.0)),
        (OrderBy::Count, false) => pairs.sort_by(|a, b| a.1.cmp(&b.1)),
        (OrderBy::Count, true) => pairs.sort_by(|a, b| b.1.cmp(&a.1)),
    }

    if let Some(limit) = options.limit {
        pairs.truncate(limit);
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items(spec: &str) -> Vec<String> {
        spec.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_count_orders_by_frequency_descending() {
        let counts = count(items("a a b c c c"), &CountOptions::by_count());
        assert_eq!(
            counts,
            vec![
                ("c".to_string(), 3),
                ("a".to_string(), 2),
                ("b".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_count_limit_truncates_ranking() {
        let counts = count(items("a a b c c c"), &CountOptions::by_count().with_limit(2));
        assert_eq!(counts, vec![("c".to_string(), 3), ("a".to_string(), 2)]);
    }

    #[test]
    fn test_ties_preserve_first_occurrence_order() {
        let counts = count(items("z z y y x x"), &CountOptions::by_count());
        assert_eq!(
            counts,
            vec![
                ("z".to_string(), 2),
                ("y".to_string(), 2),
                ("x".to_string(), 2)
            ]
        );

        // Same multiset, different arrival order, different tie order
        let counts = count(items("x x z z y y"), &CountOptions::by_count());
        assert_eq!(
            counts,
            vec![
                ("x".to_string(), 2),
                ("z".to_string(), 2),
                ("y".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_key_order_ascending_for_dates() {
        let counts = count(
            items("2014-03-02 2014-03-01 2014-03-02 2014-02-27"),
            &CountOptions::by_key_ascending(),
        );
        assert_eq!(
            counts,
            vec![
                ("2014-02-27".to_string(), 1),
                ("2014-03-01".to_string(), 1),
                ("2014-03-02".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_count_bounds_are_inclusive_and_independent() {
        let options = CountOptions::by_count().with_count_bounds(Some(2), Some(2));
        let counts = count(items("a a b c c c"), &options);
        assert_eq!(counts, vec![("a".to_string(), 2)]);

        // Only a minimum
        let options = CountOptions::by_count().with_count_bounds(Some(2), None);
        let counts = count(items("a a b c c c"), &options);
        assert_eq!(counts, vec![("c".to_string(), 3), ("a".to_string(), 2)]);

        // Only a maximum
        let options = CountOptions::by_count().with_count_bounds(None, Some(2));
        let counts = count(items("a a b c c c"), &options);
        assert_eq!(counts, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_key_bounds() {
        let options = CountOptions::by_key_ascending()
            .with_key_bounds(Some("2014-03-01".to_string()), None);
        let counts = count(
            items("2014-03-02 2014-03-01 2014-02-27"),
            &options,
        );
        assert_eq!(
            counts,
            vec![
                ("2014-03-01".to_string(), 1),
                ("2014-03-02".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_empty_ranking() {
        let counts = count(Vec::<String>::new(), &CountOptions::by_count());
        assert!(counts.is_empty());
    }
}

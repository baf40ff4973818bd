use std::collections::BTreeMap;

/// Most frequent key; ties go to the key seen first.
pub fn most_common<I, K>(items: I) -> Option<K>
where
    I: IntoIterator<Item = K>,
    K: PartialEq,
{
    let mut counts: Vec<(K, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(k, _)| *k == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    let mut best: Option<(K, usize)> = None;
    for (k, n) in counts {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((k, n));
        }
    }
    best.map(|(k, _)| k)
}

pub fn count_by<I, K>(items: I) -> BTreeMap<K, usize>
where
    I: IntoIterator<Item = K>,
    K: Ord,
{
    let mut out = BTreeMap::new();
    for k in items {
        *out.entry(k).or_insert(0) += 1;
    }
    out
}

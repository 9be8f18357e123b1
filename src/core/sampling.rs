use rand::Rng;

/// Draw up to `count` items without replacement, each draw proportional to
/// `max(weight(item), epsilon)`.
///
/// Never returns more items than it was given. The outcome depends only on
/// the input order and the RNG state, so a seeded RNG reproduces it exactly.
pub fn weighted_sample<T, R>(
    items: Vec<T>,
    weight: impl Fn(&T) -> f64,
    epsilon: f64,
    count: usize,
    rng: &mut R,
) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let floor = epsilon.max(f64::MIN_POSITIVE);
    let mut weights: Vec<f64> = items
        .iter()
        .map(|item| {
            let w = weight(item);
            if w.is_finite() { w.max(floor) } else { floor }
        })
        .collect();
    let mut pool = items;
    let mut picked = Vec::with_capacity(count.min(pool.len()));

    while picked.len() < count && !pool.is_empty() {
        let total: f64 = weights.iter().sum();
        let mut target = rng.random::<f64>() * total;

        let mut index = pool.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                index = i;
                break;
            }
            target -= w;
        }

        weights.swap_remove(index);
        picked.push(pool.swap_remove(index));
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_never_exceeds_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked = weighted_sample(vec![1, 2, 3], |_| 1.0, 0.01, 10, &mut rng);
        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_seed_reproduces_draw() {
        let items: Vec<u32> = (0..20).collect();
        let a = weighted_sample(items.clone(), |i| *i as f64, 0.01, 5, &mut StdRng::seed_from_u64(42));
        let b = weighted_sample(items, |i| *i as f64, 0.01, 5, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_weight_items_can_surface() {
        // the only item left after the heavy one is picked has weight 0
        let mut rng = StdRng::seed_from_u64(1);
        let picked = weighted_sample(vec![("heavy", 1.0), ("zero", 0.0)], |i| i.1, 0.01, 2, &mut rng);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_heavy_items_dominate() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut heavy_first = 0;
        for _ in 0..200 {
            let picked = weighted_sample(vec![("light", 0.01), ("heavy", 0.99)], |i| i.1, 0.01, 1, &mut rng);
            if picked[0].0 == "heavy" {
                heavy_first += 1;
            }
        }
        assert!(heavy_first > 150, "heavy picked {} times", heavy_first);
    }
}

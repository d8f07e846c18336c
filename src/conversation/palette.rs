use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const CHAT_ICONS: [&str; 10] = [
    "lotus", "star", "book", "feather", "sun",
    "moon", "sparkles", "heart", "flame", "tree",
];

pub const DEFAULT_AVATARS: [&str; 6] = [
    "/avatars/peacock.png",
    "/avatars/flute.png",
    "/avatars/lotus.png",
    "/avatars/cow.png",
    "/avatars/chariot.png",
    "/avatars/butter-pot.png",
];

/// Uniform choice from `pool`. A seed makes the choice reproducible.
pub fn pick_random<T>(pool: &[T], seed: Option<u64>) -> Option<&T> {
    match seed {
        Some(seed) => pool.choose(&mut StdRng::seed_from_u64(seed)),
        None => pool.choose(&mut rand::thread_rng()),
    }
}

pub fn random_icon() -> &'static str {
    pick_random(&CHAT_ICONS, None).copied().unwrap_or(CHAT_ICONS[0])
}

pub fn random_avatar() -> &'static str {
    pick_random(&DEFAULT_AVATARS, None).copied().unwrap_or(DEFAULT_AVATARS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seeded_pick_is_reproducible() {
        for seed in 0..50 {
            assert_eq!(pick_random(&CHAT_ICONS, Some(seed)), pick_random(&CHAT_ICONS, Some(seed)));
        }
    }

    #[test]
    fn seeds_cover_the_palette() {
        let seen: HashSet<_> = (0..500)
            .filter_map(|seed| pick_random(&CHAT_ICONS, Some(seed)))
            .collect();
        assert_eq!(seen.len(), CHAT_ICONS.len());
    }

    #[test]
    fn empty_pool_yields_nothing() {
        let empty: [&str; 0] = [];
        assert_eq!(pick_random(&empty, Some(7)), None);
        assert_eq!(pick_random(&empty, None), None);
    }

    #[test]
    fn random_icon_is_from_palette() {
        for _ in 0..20 {
            assert!(CHAT_ICONS.contains(&random_icon()));
            assert!(DEFAULT_AVATARS.contains(&random_avatar()));
        }
    }
}

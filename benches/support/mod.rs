#![allow(dead_code)]

use std::{sync::Mutex, time::Duration};

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rankmap::{FloatScore, RankMap, Scored};

pub type Entry = Scored<String, FloatScore>;
pub type Board = RankMap<Entry>;

static BASE_SEED: Lazy<u64> = Lazy::new(|| {
    std::env::var("RANKMAP_BENCH_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0x7d11_5eed_f065_cafe)
});

static RNG_COUNTER: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(0));

pub fn usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn duration_env(name: &str, default_secs: f64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(default_secs);
    Duration::from_secs_f64(secs)
}

#[inline]
pub fn seeded_rng() -> StdRng {
    let mut guard = RNG_COUNTER.lock().unwrap();
    let seed = BASE_SEED.wrapping_add(*guard);
    *guard = guard.wrapping_add(1);
    StdRng::seed_from_u64(seed)
}

pub fn entry(key: &str, score: f64) -> Entry {
    Scored::new(key.to_owned(), FloatScore::from(score))
}

pub fn unique_increasing(n: usize) -> Vec<(f64, String)> {
    (0..n).map(|i| (i as f64, format!("player:{i}"))).collect()
}

pub fn uniform_random(n: usize, score_range: f64) -> Vec<(f64, String)> {
    let mut rng = seeded_rng();
    (0..n)
        .map(|i| (rng.gen_range(0.0..score_range).floor(), format!("rand:{i}")))
        .collect()
}

pub fn same_score(n: usize, score: f64) -> Vec<(f64, String)> {
    (0..n).map(|i| (score, format!("same:{i}"))).collect()
}

pub fn build_board(entries: &[(f64, String)]) -> Board {
    let mut board = Board::with_capacity(entries.len());
    for (score, key) in entries {
        board.upsert(entry(key, *score));
    }
    board
}

pub fn pick_existing(entries: &[(f64, String)], k: usize) -> Vec<String> {
    let mut rng = seeded_rng();
    let mut keys: Vec<String> = entries.iter().map(|(_, key)| key.clone()).collect();
    keys.shuffle(&mut rng);
    keys.truncate(keys.len().min(k));
    keys
}

//! Online representative tracking and the quorum requirement.
//!
//! Quorum is computed against stake that is actually voting, not total
//! delegated stake: a rolling window of observed voters defines the online
//! stake, periodic snapshots of it are persisted, and the trended stake is
//! the median of those snapshots. The quorum delta is then
//! `max(minimum_floor, trended) × quorum_fraction`.

use std::collections::HashMap;
use strand_types::{Account, Amount, Timestamp};

/// Configuration for online-stake sampling and quorum.
#[derive(Clone, Copy, Debug)]
pub struct OnlineRepsConfig {
    /// A rep that voted within this window counts as online.
    pub window_secs: u64,
    /// Floor below which the quorum base never falls.
    pub online_weight_minimum: u128,
    /// Quorum fraction in parts per thousand (670 = 67%).
    pub quorum_fraction_ppt: u128,
    /// Weight share in parts per million above which a rep is *principal*
    /// (flood target for local blocks).
    pub principal_threshold_ppm: u128,
}

impl Default for OnlineRepsConfig {
    fn default() -> Self {
        Self {
            window_secs: 5 * 60,
            online_weight_minimum: 60_000_000,
            quorum_fraction_ppt: 670,
            principal_threshold_ppm: 1_000,
        }
    }
}

pub struct OnlineReps {
    config: OnlineRepsConfig,
    /// Representative → last vote observation time.
    last_seen: HashMap<Account, Timestamp>,
    /// Snapshots of observed online stake, oldest first.
    samples: Vec<u128>,
    max_samples: usize,
    /// Cached trended value, updated on each sample.
    trended: u128,
}

impl OnlineReps {
    pub fn new(config: OnlineRepsConfig) -> Self {
        Self {
            config,
            last_seen: HashMap::new(),
            samples: Vec::new(),
            max_samples: 4032,
            trended: 0,
        }
    }

    /// Seed historical samples (from the online_weight table) at startup.
    pub fn seed_samples(&mut self, samples: impl Iterator<Item = Amount>) {
        self.samples = samples.map(|a| a.value()).collect();
        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(..excess);
        }
        self.trended = median(&self.samples);
    }

    /// Record a valid vote observation from a representative.
    pub fn observe(&mut self, representative: Account, now: Timestamp) {
        let entry = self.last_seen.entry(representative).or_insert(now);
        if now > *entry {
            *entry = now;
        }
    }

    /// Representatives seen within the window.
    pub fn online_reps(&self, now: Timestamp) -> Vec<Account> {
        self.last_seen
            .iter()
            .filter(|(_, seen)| seen.elapsed_since(now) <= self.config.window_secs)
            .map(|(rep, _)| *rep)
            .collect()
    }

    /// Sum of weights of online representatives.
    pub fn online_stake(&self, now: Timestamp, weight_of: impl Fn(&Account) -> Amount) -> u128 {
        self.last_seen
            .iter()
            .filter(|(_, seen)| seen.elapsed_since(now) <= self.config.window_secs)
            .fold(0u128, |acc, (rep, _)| {
                acc.saturating_add(weight_of(rep).value())
            })
    }

    /// Take a snapshot of the current online stake; returns the sampled
    /// value so the caller can persist it to the online_weight table.
    pub fn sample(
        &mut self,
        now: Timestamp,
        weight_of: impl Fn(&Account) -> Amount,
    ) -> Amount {
        let online = self.online_stake(now, weight_of);
        self.samples.push(online);
        if self.samples.len() > self.max_samples {
            self.samples.remove(0);
        }
        self.trended = median(&self.samples);
        self.last_seen
            .retain(|_, seen| seen.elapsed_since(now) <= self.config.window_secs * 2);
        Amount::raw(online)
    }

    /// The robust statistic over recorded samples.
    pub fn trended_stake(&self) -> u128 {
        self.trended
    }

    /// The weight a winning candidate must accumulate to confirm.
    pub fn quorum_delta(&self) -> u128 {
        let base = self.trended.max(self.config.online_weight_minimum);
        base / 1000 * self.config.quorum_fraction_ppt
            + base % 1000 * self.config.quorum_fraction_ppt / 1000
    }

    /// Whether a representative's weight makes it a flood target.
    pub fn is_principal(&self, weight: Amount) -> bool {
        let base = self.trended.max(self.config.online_weight_minimum);
        if base == 0 {
            return false;
        }
        weight.value().saturating_mul(1_000_000) / base >= self.config.principal_threshold_ppm
    }

    pub fn config(&self) -> &OnlineRepsConfig {
        &self.config
    }
}

fn median(samples: &[u128]) -> u128 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn config() -> OnlineRepsConfig {
        OnlineRepsConfig {
            window_secs: 300,
            online_weight_minimum: 1000,
            quorum_fraction_ppt: 670,
            principal_threshold_ppm: 1_000,
        }
    }

    fn weights(pairs: &[(Account, u128)]) -> impl Fn(&Account) -> Amount + '_ {
        move |account| {
            Amount::raw(
                pairs
                    .iter()
                    .find(|(a, _)| a == account)
                    .map(|(_, w)| *w)
                    .unwrap_or(0),
            )
        }
    }

    #[test]
    fn online_stake_counts_recent_voters_only() {
        let mut online = OnlineReps::new(config());
        online.observe(rep(1), ts(100));
        online.observe(rep(2), ts(500));
        let table = [(rep(1), 700u128), (rep(2), 300)];
        // At t=500, rep(1) is 400s stale (window 300): offline.
        assert_eq!(online.online_stake(ts(500), weights(&table)), 300);
        assert_eq!(online.online_reps(ts(500)), vec![rep(2)]);
    }

    #[test]
    fn newest_observation_wins() {
        let mut online = OnlineReps::new(config());
        online.observe(rep(1), ts(200));
        online.observe(rep(1), ts(100));
        let table = [(rep(1), 700u128)];
        assert_eq!(online.online_stake(ts(400), weights(&table)), 700);
    }

    #[test]
    fn trended_stake_is_median_of_samples() {
        let mut online = OnlineReps::new(config());
        online.seed_samples([10_000u128, 2_000, 8_000].iter().map(|w| Amount::raw(*w)));
        assert_eq!(online.trended_stake(), 8_000);
    }

    #[test]
    fn quorum_delta_uses_floor_when_trend_collapses() {
        let mut online = OnlineReps::new(config());
        online.seed_samples([10u128, 10, 10].iter().map(|w| Amount::raw(*w)));
        // Trend (10) below the 1000 floor: quorum = 67% of 1000.
        assert_eq!(online.quorum_delta(), 670);
    }

    #[test]
    fn quorum_delta_tracks_trend_decay() {
        let mut online = OnlineReps::new(config());
        online.seed_samples([100_000u128; 5].iter().map(|w| Amount::raw(*w)));
        let high = online.quorum_delta();

        // Online stake collapses to 40%; repeated samples drag the median
        // down, and with it the quorum.
        let table = [(rep(1), 40_000u128)];
        online.observe(rep(1), ts(1000));
        for i in 0..6 {
            online.sample(ts(1000 + i), weights(&table));
        }
        let low = online.quorum_delta();
        assert!(low < high);
        assert_eq!(low, 40_000 / 1000 * 670);
    }

    #[test]
    fn sample_returns_persistable_value() {
        let mut online = OnlineReps::new(config());
        online.observe(rep(1), ts(100));
        let table = [(rep(1), 5_000u128)];
        let sampled = online.sample(ts(101), weights(&table));
        assert_eq!(sampled, Amount::raw(5_000));
        assert_eq!(online.trended_stake(), 5_000);
    }

    #[test]
    fn principal_classification() {
        let mut online = OnlineReps::new(config());
        online.seed_samples([1_000_000u128].iter().map(|w| Amount::raw(*w)));
        // 0.1% of 1,000,000 = 1,000.
        assert!(online.is_principal(Amount::raw(1_000)));
        assert!(!online.is_principal(Amount::raw(999)));
    }
}

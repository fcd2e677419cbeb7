use dashmap::DashMap;

/// Per-client request counter backing the free-tier gate.
///
/// Counts live in memory only; a restart resets everyone.
pub struct RequestCounter {
    counts: DashMap<String, u32>,
    limit: u32,
}

impl RequestCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            counts: DashMap::new(),
            limit,
        }
    }

    pub fn count(&self, client: &str) -> u32 {
        self.counts.get(client).map(|c| *c).unwrap_or(0)
    }

    pub fn increment(&self, client: &str) -> u32 {
        let mut entry = self.counts.entry(client.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_limit_exceeded(&self, client: &str) -> bool {
        self.count(client) >= self.limit
    }

    pub fn remaining(&self, client: &str) -> u32 {
        self.limit.saturating_sub(self.count(client))
    }

    pub fn reset(&self, client: &str) {
        self.counts.remove(client);
    }
}

use crate::update::UpdateType;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Replication counters of one map, or of the whole world once merged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationStats {
    /// Ticks processed
    pub ticks: u64,
    /// Create blocks built, both create variants included
    pub create_blocks: u64,
    /// Values blocks built
    pub values_blocks: u64,
    /// Destroy blocks built
    pub destroy_blocks: u64,
    /// Packets handed to the transport
    pub packets_sent: u64,
    /// Bytes handed to the transport
    pub bytes_sent: u64,
    /// Packets that went out compressed
    pub compressed_packets: u64,
    /// Visibility decisions taken by the notifiers
    pub visibility_evaluations: u64,
    /// Range-limited messages delivered
    pub messages_delivered: u64,
}

impl ReplicationStats {
    pub fn record_block(&mut self, update_type: UpdateType) {
        match update_type {
            UpdateType::CreateObject | UpdateType::CreateObject2 => self.create_blocks += 1,
            UpdateType::Values => self.values_blocks += 1,
            UpdateType::Destroy => self.destroy_blocks += 1,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        self.create_blocks + self.values_blocks + self.destroy_blocks
    }

    pub fn merged(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for ReplicationStats {
    fn add_assign(&mut self, other: Self) {
        self.ticks += other.ticks;
        self.create_blocks += other.create_blocks;
        self.values_blocks += other.values_blocks;
        self.destroy_blocks += other.destroy_blocks;
        self.packets_sent += other.packets_sent;
        self.bytes_sent += other.bytes_sent;
        self.compressed_packets += other.compressed_packets;
        self.visibility_evaluations += other.visibility_evaluations;
        self.messages_delivered += other.messages_delivered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_stats_serialize_as_flat_counters() {
        let mut map_a = ReplicationStats::default();
        map_a.record_block(UpdateType::CreateObject2);
        map_a.record_block(UpdateType::Values);
        let mut map_b = ReplicationStats::default();
        map_b.record_block(UpdateType::Destroy);
        map_b.bytes_sent = 64;

        let total = map_a.merged(map_b);
        assert_eq!(total.total_blocks(), 3);

        let json = serde_json::to_value(total).unwrap();
        assert_eq!(json["create_blocks"], 1);
        assert_eq!(json["bytes_sent"], 64);
    }
}

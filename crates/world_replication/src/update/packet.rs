//! Per-observer aggregation of update blocks and the packet framing around them.
//!
//! ```text
//! u8        flags (bit 0: body is zlib compressed)
//! [u32]     uncompressed body length, only when compressed
//! body:
//!   u32     map id
//!   u32     block count
//!   blocks  destroys, then creates, then values
//! ```

use super::header::CreateObjectHeader;
use super::wire::{WireReader, WireWriter};
use super::{UpdateBlock, UpdateType};
use crate::config::NetworkConfig;
use crate::error::DecodeError;
use crate::fields::{DynamicChange, UpdateMask};
use crate::types::{MapId, ObjectGuid, TypeId};
use bytes::Bytes;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tracing::{debug, warn};

const FLAG_COMPRESSED: u8 = 0x01;
/// Upper bound on the buffer reserved up front from a packet's declared length.
const MAX_PREALLOCATED_BODY: usize = 64 * 1024;

/// Everything one observer receives for one map in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateData {
    map_id: MapId,
    destroys: Vec<UpdateBlock>,
    creates: Vec<UpdateBlock>,
    values: Vec<UpdateBlock>,
}

impl UpdateData {
    pub fn new(map_id: MapId) -> Self {
        Self {
            map_id,
            destroys: Vec::new(),
            creates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    pub fn add_block(&mut self, block: UpdateBlock) {
        match block.update_type {
            UpdateType::Destroy => self.destroys.push(block),
            UpdateType::CreateObject | UpdateType::CreateObject2 => self.creates.push(block),
            UpdateType::Values => self.values.push(block),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.destroys.is_empty() && self.creates.is_empty() && self.values.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.destroys.len() + self.creates.len() + self.values.len()
    }

    /// Blocks in the order a client must apply them.
    pub fn blocks(&self) -> impl Iterator<Item = &UpdateBlock> {
        self.destroys.iter().chain(&self.creates).chain(&self.values)
    }

    /// Frames the blocks into packets of at most `max_blocks_per_packet` blocks,
    /// compressing bodies above the configured threshold.
    pub fn build_packets(&self, config: &NetworkConfig) -> Vec<Bytes> {
        if self.is_empty() {
            return Vec::new();
        }
        let blocks: Vec<&UpdateBlock> = self.blocks().collect();
        let per_packet = config.max_blocks_per_packet.max(1);

        blocks
            .chunks(per_packet)
            .map(|chunk| {
                let size = chunk.iter().map(|block| block.data.len()).sum::<usize>() + 8;
                let mut body = WireWriter::with_capacity(size);
                body.put_u32(self.map_id.0);
                body.put_u32(chunk.len() as u32);
                for block in chunk {
                    body.put_slice(&block.data);
                }
                frame(body.into_bytes(), config)
            })
            .collect()
    }
}

fn frame(body: Bytes, config: &NetworkConfig) -> Bytes {
    if config.enable_compression && body.len() > config.compression_threshold {
        if let Some(compressed) = compress(&body) {
            let mut w = WireWriter::with_capacity(compressed.len() + 5);
            w.put_u8(FLAG_COMPRESSED);
            w.put_u32(body.len() as u32);
            w.put_slice(&compressed);
            return w.into_bytes();
        }
    }
    let mut w = WireWriter::with_capacity(body.len() + 1);
    w.put_u8(0);
    w.put_slice(&body);
    w.into_bytes()
}

/// Whether a framed packet carries a compressed body.
pub fn is_compressed_packet(packet: &[u8]) -> bool {
    packet.first().is_some_and(|flags| flags & FLAG_COMPRESSED != 0)
}

/// Compressed body, or `None` when compression failed or did not pay off.
fn compress(body: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(body.len() / 2), Compression::fast());
    let compressed = match encoder.write_all(body) {
        Ok(()) => encoder.finish(),
        Err(err) => Err(err),
    };
    match compressed {
        Ok(compressed) if compressed.len() < body.len() => Some(compressed),
        Ok(compressed) => {
            debug!(raw = body.len(), compressed = compressed.len(), "Compression did not shrink update packet");
            None
        }
        Err(err) => {
            warn!("⚠️ Failed to compress update packet, sending it raw: {}", err);
            None
        }
    }
}

/// Decoded element changes of one dynamic field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDynamic {
    pub change: DynamicChange,
    pub len: u16,
    pub elements: BTreeMap<u16, u32>,
}

impl DecodedDynamic {
    pub fn values(&self) -> Vec<u32> {
        self.elements.values().copied().collect()
    }
}

/// Field section of a create or values block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedFields {
    pub scalars: BTreeMap<u16, u32>,
    pub dynamic: BTreeMap<u16, DecodedDynamic>,
}

impl DecodedFields {
    pub fn scalar(&self, slot: u16) -> Option<u32> {
        self.scalars.get(&slot).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBlock {
    Create {
        update_type: UpdateType,
        guid: ObjectGuid,
        type_id: TypeId,
        header: CreateObjectHeader,
        fields: DecodedFields,
    },
    Values {
        guid: ObjectGuid,
        fields: DecodedFields,
    },
    Destroy {
        guid: ObjectGuid,
    },
}

impl DecodedBlock {
    pub fn guid(&self) -> ObjectGuid {
        match self {
            DecodedBlock::Create { guid, .. } | DecodedBlock::Values { guid, .. } | DecodedBlock::Destroy { guid } => {
                *guid
            }
        }
    }

    pub fn update_type(&self) -> UpdateType {
        match self {
            DecodedBlock::Create { update_type, .. } => *update_type,
            DecodedBlock::Values { .. } => UpdateType::Values,
            DecodedBlock::Destroy { .. } => UpdateType::Destroy,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub map_id: MapId,
    pub blocks: Vec<DecodedBlock>,
}

/// Decodes one framed packet as produced by [`UpdateData::build_packets`].
pub fn decode_packet(packet: Bytes) -> Result<DecodedPacket, DecodeError> {
    let mut r = WireReader::new(packet);
    let flags = r.u8("packet flags")?;
    let body = if flags & FLAG_COMPRESSED != 0 {
        let raw_len = r.u32("uncompressed length")? as usize;
        let compressed = r.bytes(r.remaining(), "compressed body")?;
        let mut raw = Vec::with_capacity(raw_len.min(MAX_PREALLOCATED_BODY));
        ZlibDecoder::new(&compressed[..])
            .take(raw_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|err| DecodeError::Decompression(err.to_string()))?;
        if raw.len() != raw_len {
            return Err(DecodeError::Decompression(format!(
                "expected {raw_len} bytes, got {}",
                raw.len()
            )));
        }
        Bytes::from(raw)
    } else {
        r.bytes(r.remaining(), "packet body")?
    };

    let mut r = WireReader::new(body);
    let map_id = MapId(r.u32("map id")?);
    let count = r.u32("block count")?;
    let blocks = (0..count).map(|_| read_block(&mut r)).collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedPacket { map_id, blocks })
}

pub(crate) fn read_block(r: &mut WireReader) -> Result<DecodedBlock, DecodeError> {
    let tag = r.u8("block type")?;
    let update_type = UpdateType::from_u8(tag).ok_or(DecodeError::UnknownBlockType(tag))?;
    let guid = r.packed_guid("block guid")?;

    Ok(match update_type {
        UpdateType::CreateObject | UpdateType::CreateObject2 => {
            let raw_type = r.u8("object type")?;
            let type_id = TypeId::from_u8(raw_type).ok_or(DecodeError::UnknownTypeId(raw_type))?;
            let header = CreateObjectHeader::read(r)?;
            let fields = read_fields(r)?;
            DecodedBlock::Create {
                update_type,
                guid,
                type_id,
                header,
                fields,
            }
        }
        UpdateType::Values => DecodedBlock::Values {
            guid,
            fields: read_fields(r)?,
        },
        UpdateType::Destroy => DecodedBlock::Destroy { guid },
    })
}

fn read_mask(r: &mut WireReader, what: &'static str) -> Result<UpdateMask, DecodeError> {
    let count = r.u8(what)?;
    let blocks = (0..count).map(|_| r.u32(what)).collect::<Result<Vec<_>, _>>()?;
    Ok(UpdateMask::from_blocks(blocks))
}

fn read_fields(r: &mut WireReader) -> Result<DecodedFields, DecodeError> {
    let mut fields = DecodedFields::default();

    let scalars = read_mask(r, "scalar mask")?;
    for slot in scalars.iter_set() {
        fields.scalars.insert(slot as u16, r.u32("slot value")?);
    }

    let dynamic = read_mask(r, "dynamic mask")?;
    for field in dynamic.iter_set() {
        let tag = r.u8("dynamic change")?;
        let change = DynamicChange::from_u8(tag).ok_or(DecodeError::UnknownDynamicChange(tag))?;
        let len = r.u16("dynamic length")?;
        let elements = read_mask(r, "element mask")?;
        let mut decoded = DecodedDynamic {
            change,
            len,
            elements: BTreeMap::new(),
        };
        for index in elements.iter_set() {
            decoded.elements.insert(index as u16, r.u32("element value")?);
        }
        fields.dynamic.insert(field as u16, decoded);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ObjectRegistry, WorldObject};
    use crate::types::{InstanceId, Position, Team, WorldLocation};
    use crate::update::UpdateBlockBuilder;

    fn at(x: f32) -> WorldLocation {
        WorldLocation::new(MapId(530), InstanceId(0), Position::new(x, 0.0, 0.0))
    }

    fn raw_config(max_blocks: usize) -> NetworkConfig {
        NetworkConfig {
            enable_compression: false,
            compression_threshold: 1024,
            max_blocks_per_packet: max_blocks,
        }
    }

    fn sample_data(creatures: u64) -> UpdateData {
        let registry = ObjectRegistry::new();
        let builder = UpdateBlockBuilder::new(&registry, 1000);
        let observer = WorldObject::player(1, at(0.0), Team::Horde);

        let mut data = UpdateData::new(MapId(530));
        for counter in 1..=creatures {
            let mut creature = WorldObject::creature(3100, counter, at(counter as f32));
            data.add_block(builder.build_create(&creature, Some(&observer)).unwrap());
            creature.fields.clear_dirty();
            creature.fields.set(crate::fields::layout::unit::HEALTH, 50);
            data.add_block(builder.build_values(&creature, Some(&observer)).unwrap());
        }
        data.add_block(builder.build_destroy(ObjectGuid::player(99), Some(&observer)).unwrap());
        data
    }

    #[test]
    fn blocks_are_sent_destroy_create_values() {
        let data = sample_data(2);
        assert_eq!(data.block_count(), 5);

        let packets = data.build_packets(&raw_config(512));
        assert_eq!(packets.len(), 1);
        let decoded = decode_packet(packets[0].clone()).unwrap();
        assert_eq!(decoded.map_id, MapId(530));
        let order: Vec<_> = decoded.blocks.iter().map(DecodedBlock::update_type).collect();
        assert_eq!(
            order,
            vec![
                UpdateType::Destroy,
                UpdateType::CreateObject2,
                UpdateType::CreateObject2,
                UpdateType::Values,
                UpdateType::Values,
            ]
        );
    }

    #[test]
    fn large_bodies_are_compressed_and_restored() {
        let data = sample_data(20);
        let config = NetworkConfig {
            enable_compression: true,
            compression_threshold: 64,
            max_blocks_per_packet: 512,
        };

        let compressed = data.build_packets(&config);
        let raw = data.build_packets(&raw_config(512));
        assert!(is_compressed_packet(&compressed[0]));
        assert!(!is_compressed_packet(&raw[0]));
        assert!(compressed[0].len() < raw[0].len());
        assert_eq!(
            decode_packet(compressed[0].clone()).unwrap(),
            decode_packet(raw[0].clone()).unwrap()
        );
    }

    #[test]
    fn oversized_updates_are_split_in_order() {
        let data = sample_data(3);
        let packets = data.build_packets(&raw_config(3));
        assert_eq!(packets.len(), 3);

        let guids: Vec<_> = packets
            .into_iter()
            .flat_map(|packet| decode_packet(packet).unwrap().blocks)
            .map(|block| block.guid())
            .collect();
        let expected: Vec<_> = data.blocks().map(|block| block.guid).collect();
        assert_eq!(guids, expected);
    }

    #[test]
    fn empty_update_builds_no_packets() {
        assert!(UpdateData::new(MapId(0)).build_packets(&NetworkConfig::default()).is_empty());
    }

    #[test]
    fn malformed_packets_are_rejected() {
        assert_eq!(
            decode_packet(Bytes::from_static(&[0, 1, 0, 0, 0, 1, 0, 0, 0, 9])),
            Err(DecodeError::UnknownBlockType(9))
        );
        assert_eq!(
            decode_packet(Bytes::from_static(&[0, 1, 0])),
            Err(DecodeError::Truncated("map id"))
        );
        assert!(matches!(
            decode_packet(Bytes::from_static(&[FLAG_COMPRESSED, 4, 0, 0, 0, 1, 2, 3])),
            Err(DecodeError::Decompression(_))
        ));
    }

    #[test]
    fn declared_length_must_match_the_inflated_body() {
        let compressed = compress(&[7u8; 256]).unwrap();
        let framed = |raw_len: u32| {
            let mut packet = vec![FLAG_COMPRESSED];
            packet.extend_from_slice(&raw_len.to_le_bytes());
            packet.extend_from_slice(&compressed);
            Bytes::from(packet)
        };

        for raw_len in [u32::MAX, 10, 255, 257] {
            assert!(
                matches!(decode_packet(framed(raw_len)), Err(DecodeError::Decompression(_))),
                "declared {raw_len}"
            );
        }
        // 256 bytes of 7s inflate fine but are not a valid body.
        assert!(!matches!(decode_packet(framed(256)), Err(DecodeError::Decompression(_))));
    }
}

//! Topic creation and message submission.

use crate::account::{Topic, TopicMessage};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::hash::{digest, hash_bytes_be};
use crate::key::{authorize, validate_optional, Key, SignerSet};
use crate::store::LedgerStore;
use crate::types::{EntityKind, EntityRef, Timestamp, TopicId};

pub fn create(store: &mut LedgerStore, memo: String, submit_key: Option<Key>, config: &LedgerConfig) -> Result<TopicId> {
    if memo.len() > config.max_memo_len {
        return Err(LedgerError::InvalidTransaction(format!(
            "topic memo is {} bytes, limit is {}",
            memo.len(),
            config.max_memo_len
        )));
    }
    validate_optional(submit_key.as_ref())?;
    let id = TopicId::from(store.next_id(EntityKind::Topic));
    store.put_topic(Topic::new(id, memo, submit_key));
    Ok(id)
}

/// Appends `payload` with the next sequence number. The consensus timestamp
/// is `now`, bumped if needed so it stays strictly above the previous one.
pub fn submit(
    store: &mut LedgerStore,
    topic_id: &TopicId,
    payload: Vec<u8>,
    signers: &SignerSet,
    now: Timestamp,
    config: &LedgerConfig,
) -> Result<TopicMessage> {
    let topic = store.get_topic(topic_id)?;
    authorize(topic.submit_key.as_ref(), signers, EntityRef::Topic(*topic_id))?;
    if payload.is_empty() {
        return Err(LedgerError::InvalidTransaction("message payload is empty".into()));
    }
    if payload.len() > config.max_message_size {
        return Err(LedgerError::InvalidTransaction(format!(
            "message payload is {} bytes, limit is {}",
            payload.len(),
            config.max_message_size
        )));
    }

    let previous = topic.messages.last();
    let consensus_timestamp = match previous {
        Some(last) if now <= last.consensus_timestamp => last.consensus_timestamp.next(),
        _ => now,
    };
    let previous_hash = previous.map(|m| m.running_hash).unwrap_or_default();
    let running_hash = hash_bytes_be(&[&previous_hash, &digest(&payload)?])?;
    let message = TopicMessage {
        topic: *topic_id,
        sequence_number: topic.sequence_number() + 1,
        consensus_timestamp,
        payload,
        running_hash,
    };

    store.topic_mut(topic_id)?.messages.push(message.clone());
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (LedgerStore, LedgerConfig) {
        let config = LedgerConfig::default();
        (LedgerStore::new(&config), config)
    }

    #[test]
    fn test_sequence_numbers_start_at_one() {
        let (mut store, config) = setup();
        let topic = create(&mut store, "news".into(), None, &config).unwrap();
        let signers = SignerSet::new();
        for (i, body) in ["M1", "M2", "M3"].iter().enumerate() {
            let msg = submit(&mut store, &topic, body.as_bytes().to_vec(), &signers, Timestamp(10), &config).unwrap();
            assert_eq!(msg.sequence_number, i as u64 + 1);
        }
        let stored = &store.get_topic(&topic).unwrap().messages;
        assert_eq!(stored[2].payload, b"M3");
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let (mut store, config) = setup();
        let topic = create(&mut store, String::new(), None, &config).unwrap();
        let signers = SignerSet::new();
        let a = submit(&mut store, &topic, vec![1], &signers, Timestamp(50), &config).unwrap();
        let b = submit(&mut store, &topic, vec![2], &signers, Timestamp(40), &config).unwrap();
        let c = submit(&mut store, &topic, vec![3], &signers, Timestamp(90), &config).unwrap();
        assert_eq!(a.consensus_timestamp, Timestamp(50));
        assert_eq!(b.consensus_timestamp, Timestamp(51));
        assert_eq!(c.consensus_timestamp, Timestamp(90));
    }

    #[test]
    fn test_running_hash_chains_messages() {
        let (mut store, config) = setup();
        let first = create(&mut store, String::new(), None, &config).unwrap();
        let second = create(&mut store, String::new(), None, &config).unwrap();
        let signers = SignerSet::new();
        let a1 = submit(&mut store, &first, b"x".to_vec(), &signers, Timestamp(1), &config).unwrap();
        let a2 = submit(&mut store, &first, b"y".to_vec(), &signers, Timestamp(2), &config).unwrap();
        let b1 = submit(&mut store, &second, b"y".to_vec(), &signers, Timestamp(3), &config).unwrap();
        assert_ne!(a1.running_hash, a2.running_hash);
        assert_ne!(a2.running_hash, b1.running_hash);
    }

    #[test]
    fn test_submit_key_gates_messages() {
        let (mut store, config) = setup();
        let members = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let key = Key::threshold(2, members).unwrap();
        let topic = create(&mut store, "private".into(), Some(key), &config).unwrap();

        let one: SignerSet = [members[0]].into_iter().collect();
        assert_eq!(
            submit(&mut store, &topic, b"m".to_vec(), &one, Timestamp(1), &config),
            Err(LedgerError::Unauthorized(EntityRef::Topic(topic)))
        );
        let two: SignerSet = [members[0], members[2]].into_iter().collect();
        let msg = submit(&mut store, &topic, b"m".to_vec(), &two, Timestamp(2), &config).unwrap();
        assert_eq!(msg.sequence_number, 1);
    }

    #[test]
    fn test_unsatisfiable_submit_key_is_rejected() {
        let (mut store, config) = setup();
        let locked = Key::Threshold {
            threshold: 3,
            members: vec![[1u8; 32], [2u8; 32]],
        };
        assert!(matches!(
            create(&mut store, "locked".into(), Some(locked), &config),
            Err(LedgerError::InvalidKey(_))
        ));
        // the failed create must not burn an id
        let next = create(&mut store, "open".into(), None, &config).unwrap();
        assert_eq!(next, TopicId::new(config.shard, config.realm, config.first_entity_num));
    }

    #[test]
    fn test_payload_limits() {
        let (mut store, config) = setup();
        let topic = create(&mut store, String::new(), None, &config).unwrap();
        let signers = SignerSet::new();
        assert!(submit(&mut store, &topic, Vec::new(), &signers, Timestamp(1), &config).is_err());
        let oversized = vec![0u8; config.max_message_size + 1];
        assert!(submit(&mut store, &topic, oversized, &signers, Timestamp(1), &config).is_err());
        assert_eq!(store.get_topic(&topic).unwrap().sequence_number(), 0);
    }

    #[test]
    fn test_memo_limit() {
        let (mut store, config) = setup();
        let memo = "m".repeat(config.max_memo_len + 1);
        assert!(matches!(
            create(&mut store, memo, None, &config),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }
}

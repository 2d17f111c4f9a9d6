//! Tamper-evident hash chain over audit events.
//!
//! `current_hash = sha256(canonical(material) ‖ previous_hash)` where the
//! material binds the chain scope, the sequence, the payload hash and the
//! payload itself. Verification replays the chain from genesis using the
//! recomputed hashes, so altering one payload breaks that event and every
//! event after it.

use std::fmt::Write;

use bastion_core::{AppError, AppResult};
use bastion_domain::{ChainScope, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::audit_ports::{ChainHead, SealedAuditEvent};
use crate::digest::sha256_hex;
use crate::masking::without_nul;

/// Previous-hash value of the first event in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Serializes a JSON value with object keys sorted at every depth and no
/// insignificant whitespace.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut output = String::new();
    write_canonical(value, &mut output);
    output
}

fn write_canonical(value: &Value, output: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();

            output.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                let _ = write!(output, "{}", Value::String(key.clone()));
                output.push(':');
                if let Some(entry) = map.get(key) {
                    write_canonical(entry, output);
                }
            }
            output.push('}');
        }
        Value::Array(items) => {
            output.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    output.push(',');
                }
                write_canonical(item, output);
            }
            output.push(']');
        }
        scalar => {
            let _ = write!(output, "{scalar}");
        }
    }
}

/// Hash over a canonical payload alone.
#[must_use]
pub fn payload_hash(payload: &Value) -> String {
    sha256_hex(&[canonicalize(payload).as_str()])
}

/// Hash linking a payload to its chain position and predecessor.
#[must_use]
pub fn link_hash(
    chain_scope: &ChainScope,
    sequence: u64,
    payload_hash: &str,
    payload: &Value,
    previous_hash: &str,
) -> String {
    let material = json!({
        "chainScope": chain_scope.as_str(),
        "sequence": sequence,
        "payloadHash": payload_hash,
        "payload": payload,
    });

    sha256_hex(&[canonicalize(&material).as_str(), previous_hash])
}

/// Inputs for sealing one event onto a chain.
pub struct SealInput<'a, T: Serialize> {
    /// Event identifier, reused across re-seals after a conflict.
    pub audit_id: Uuid,
    /// Target chain.
    pub chain_scope: &'a ChainScope,
    /// Current chain head; `None` for an empty chain.
    pub head: Option<&'a ChainHead>,
    /// Event severity.
    pub severity: Severity,
    /// Retention obligation in years.
    pub retention_years: u16,
    /// Time of sealing.
    pub recorded_at: DateTime<Utc>,
    /// Event body.
    pub body: &'a T,
}

/// Seals an event body onto the chain after `head`.
///
/// NUL characters anywhere in the body are replaced before hashing so the
/// sealed payload is storable as-is.
pub fn seal<T: Serialize>(input: SealInput<'_, T>) -> AppResult<SealedAuditEvent> {
    let payload = serde_json::to_value(input.body)
        .map(without_nul)
        .map_err(|error| {
            AppError::Internal(format!("failed to serialize audit payload: {error}"))
        })?;

    let (sequence, previous_hash) = match input.head {
        Some(head) => (head.sequence.saturating_add(1), head.current_hash.clone()),
        None => (1, GENESIS_HASH.to_owned()),
    };
    let payload_hash = payload_hash(&payload);
    let current_hash = link_hash(
        input.chain_scope,
        sequence,
        payload_hash.as_str(),
        &payload,
        previous_hash.as_str(),
    );

    Ok(SealedAuditEvent {
        audit_id: input.audit_id,
        chain_scope: input.chain_scope.clone(),
        sequence,
        previous_hash,
        current_hash,
        payload_hash,
        severity: input.severity,
        retention_years: input.retention_years,
        recorded_at: input.recorded_at,
        payload,
    })
}

/// Outcome of replaying a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    /// Number of events replayed.
    pub total_events: u64,
    /// Whether every stored hash matched its recomputation.
    pub intact: bool,
    /// First sequence whose stored hash did not match.
    pub first_break_at: Option<u64>,
    /// Every sequence whose stored link did not match.
    pub broken_sequences: Vec<u64>,
    /// Sequences absent between the first and last event.
    pub missing_sequences: Vec<u64>,
    /// Recomputed hash of the last event.
    pub head_hash: String,
}

/// Replays events in sequence order from genesis.
#[must_use]
pub fn verify_chain(events: &[SealedAuditEvent]) -> ChainVerification {
    let mut expected_previous = GENESIS_HASH.to_owned();
    let mut expected_sequence = 1_u64;
    let mut broken_sequences = Vec::new();
    let mut missing_sequences = Vec::new();

    for event in events {
        if event.sequence > expected_sequence {
            missing_sequences.extend(expected_sequence..event.sequence);
        }

        let recomputed_payload_hash = payload_hash(&event.payload);
        let recomputed = link_hash(
            &event.chain_scope,
            event.sequence,
            recomputed_payload_hash.as_str(),
            &event.payload,
            expected_previous.as_str(),
        );

        let linked = event.previous_hash == expected_previous
            && event.sequence == expected_sequence
            && event.payload_hash == recomputed_payload_hash
            && event.current_hash == recomputed;
        if !linked {
            broken_sequences.push(event.sequence);
        }

        expected_previous = recomputed;
        expected_sequence = event.sequence.saturating_add(1);
    }

    ChainVerification {
        total_events: events.len() as u64,
        intact: broken_sequences.is_empty() && missing_sequences.is_empty(),
        first_break_at: broken_sequences.first().copied(),
        broken_sequences,
        missing_sequences,
        head_hash: expected_previous,
    }
}

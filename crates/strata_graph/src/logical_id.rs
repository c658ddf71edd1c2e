//! Logical id allocation.
//!
//! A generated id is the sanitized hint followed by eight hex digits taken
//! from a SHA-256 digest of the stack name, resource type, hint and the
//! node's ordinal among earlier declarations sharing that hint. The suffix
//! depends on position alone: property values never feed the digest, so
//! editing a property never renames a deployed resource.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{GraphError, GraphResult};

const SUFFIX_BYTES: usize = 4;
const FALLBACK_HINT: &str = "Resource";

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static pattern"))
}

fn forced_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static pattern"))
}

/// Strip everything that may not appear in a logical id.
pub fn sanitize_hint(hint: &str) -> String {
    let cleaned = non_alphanumeric().replace_all(hint, "");
    if cleaned.is_empty() {
        FALLBACK_HINT.to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Check an explicitly forced logical id.
pub fn validate_forced_id(id: &str) -> GraphResult<()> {
    if forced_id_pattern().is_match(id) {
        Ok(())
    } else {
        Err(GraphError::InvalidLogicalId(id.to_string()))
    }
}

/// Deterministic suffix for one candidate id.
pub fn suffix(stack_name: &str, resource_type: &str, hint: &str, ordinal: usize, salt: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stack_name.as_bytes());
    hasher.update(b"/");
    hasher.update(resource_type.as_bytes());
    hasher.update(b"/");
    hasher.update(hint.as_bytes());
    hasher.update(b"/");
    hasher.update(ordinal.to_string().as_bytes());
    hasher.update(b"/");
    hasher.update(salt.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode_upper(&digest[..SUFFIX_BYTES])
}

/// Hands out ids for one stack.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    stack_name: String,
    ordinals: HashMap<String, usize>,
}

impl IdAllocator {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            ordinals: HashMap::new(),
        }
    }

    /// Allocate an id for `hint` that `is_taken` does not already claim.
    pub fn allocate(&mut self, resource_type: &str, hint: &str, is_taken: impl Fn(&str) -> bool) -> String {
        let hint = sanitize_hint(hint);
        let ordinal = {
            let counter = self.ordinals.entry(hint.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };

        let mut salt = 0;
        loop {
            let candidate = format!(
                "{}{}",
                hint,
                suffix(&self.stack_name, resource_type, &hint, ordinal, salt)
            );
            if !is_taken(&candidate) {
                return candidate;
            }
            warn!("Logical id {} already taken, re-salting", candidate);
            salt += 1;
        }
    }
}

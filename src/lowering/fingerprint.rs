//! Stable content hashing for [`super::graph::BuildNode::fingerprint_hex`]
//! (spec §4.E, §8 invariant 6): a pure function of the canonical reference,
//! the resolved base, and the ordered non-push effects.

use sha2::{Digest, Sha256};

use crate::lowering::graph::Effect;

/// Hash `canonical_ref` + `base_descriptor` + `effects` into a stable hex
/// digest. `push_effects` must never be passed here — callers are expected
/// to pass only the non-push effect list, per spec §4.E ("A fingerprint
/// does not include `push_effects`").
pub fn compute(canonical_ref: &str, base_descriptor: &str, effects: &[Effect]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((canonical_ref.len() as u64).to_le_bytes());
    hasher.update(canonical_ref.as_bytes());
    hasher.update((base_descriptor.len() as u64).to_le_bytes());
    hasher.update(base_descriptor.as_bytes());
    let effects_json =
        serde_json::to_vec(effects).expect("Effect serialization is infallible");
    hasher.update(&effects_json);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowering::graph::CacheClass;

    fn effect(opcode: &str, args: &[&str]) -> Effect {
        Effect::new(opcode, args.iter().map(|s| s.to_string()).collect(), Vec::new(), CacheClass::Pure)
    }

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let effects = vec![effect("RUN", &["echo", "hi"])];
        let a = compute("+build", "alpine:3.18", &effects);
        let b = compute("+build", "alpine:3.18", &effects);
        assert_eq!(a, b);
    }

    #[test]
    fn different_effects_change_fingerprint() {
        let a = compute("+build", "alpine:3.18", &[effect("RUN", &["echo", "hi"])]);
        let b = compute("+build", "alpine:3.18", &[effect("RUN", &["echo", "bye"])]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_base_changes_fingerprint() {
        let effects = vec![effect("RUN", &["echo", "hi"])];
        let a = compute("+build", "alpine:3.18", &effects);
        let b = compute("+build", "alpine:3.19", &effects);
        assert_ne!(a, b);
    }

    #[test]
    fn ref_base_boundary_does_not_collide() {
        // "ab" + "c" must not hash the same as "a" + "bc".
        let a = compute("ab", "c", &[]);
        let b = compute("a", "bc", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn flag_only_change_still_changes_fingerprint() {
        let plain = Effect::new("RUN", vec!["./script.sh".to_string()], Vec::new(), CacheClass::Network);
        let privileged = Effect::new(
            "RUN",
            vec!["./script.sh".to_string()],
            vec![("privileged".to_string(), "true".to_string())],
            CacheClass::Network,
        );
        let a = compute("+build", "alpine:3.18", &[plain]);
        let b = compute("+build", "alpine:3.18", &[privileged]);
        assert_ne!(a, b);
    }
}

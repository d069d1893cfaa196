//! Client-global runtime knobs.
//!
//! These are the only process-wide inputs to the cleanup core. They are
//! passed as an explicit value so tests (and strict installations) can vary
//! them per run instead of reaching into ambient configuration.

use serde::{Deserialize, Serialize};

/// Escape hatches for the checkpoint-protection gate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RuntimeKnobs {
    /// Permit deleting protected history when every affected commit's
    /// checksum carries a protocol the client fully supports. Turning this
    /// off forces the gate to deny that path outright.
    #[serde(default = "default_true")]
    pub allow_cleanup_when_all_protocols_supported: bool,

    /// Permit the gate to accept a deletion range that is already anchored
    /// by a complete checkpoint at the boundary version. Strict installations
    /// turn this off to forbid the short-circuit.
    #[serde(default = "default_true")]
    pub boundary_checkpoint_check_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeKnobs {
    fn default() -> Self {
        Self {
            allow_cleanup_when_all_protocols_supported: true,
            boundary_checkpoint_check_enabled: true,
        }
    }
}

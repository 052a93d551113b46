use std::time::Duration;
use typed_builder::TypedBuilder;

/// How `Fx1E` (`ADD I, Vx`) treats VF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexOverflow {
    /// VF = 1 when the sum leaves the 12-bit address space (> 0xFFF).
    #[default]
    Addressable,
    /// VF = 1 when the sum exceeds 0xFF. Some older interpreters did this.
    Byte,
    /// VF is left alone, as on the COSMAC VIP.
    Unaffected,
}

impl IndexOverflow {
    /// The VF value for `index + value`, or `None` when VF is not touched.
    pub fn flag(self, sum: u32) -> Option<u8> {
        match self {
            IndexOverflow::Addressable => Some((sum > 0xFFF) as u8),
            IndexOverflow::Byte => Some((sum > 0xFF) as u8),
            IndexOverflow::Unaffected => None,
        }
    }
}

/// Behaviours that differ between CHIP-8 interpreters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct Quirks {
    /// `Fx55`/`Fx65` leave `I` pointing past the last register copied
    /// (`I += x + 1`).
    #[builder(default = false)]
    pub increment_index_on_transfer: bool,
    #[builder(default)]
    pub index_overflow: IndexOverflow,
    /// Drop writes that would land in the interpreter area below 0x200.
    #[builder(default = true)]
    pub protect_reserved_memory: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct MachineConfig {
    #[builder(default)]
    pub quirks: Quirks,
    /// Sleep between key-state polls while `Fx0A` waits.
    #[builder(default = Duration::from_millis(5))]
    pub key_poll_interval: Duration,
    /// Give up waiting on `Fx0A` after this long and return
    /// [`StepOutcome::AwaitingKey`](crate::StepOutcome::AwaitingKey).
    /// `None` waits until a key is pressed.
    #[builder(default, setter(strip_option))]
    pub key_wait_timeout: Option<Duration>,
    /// Seed for `Cxkk`. `None` seeds from OS entropy.
    #[builder(default, setter(strip_option))]
    pub rng_seed: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_modern_interpreters() {
        let quirks = Quirks::default();
        assert!(!quirks.increment_index_on_transfer);
        assert_eq!(quirks.index_overflow, IndexOverflow::Addressable);
        assert!(quirks.protect_reserved_memory);

        let config = MachineConfig::default();
        assert_eq!(config.key_poll_interval, Duration::from_millis(5));
        assert_eq!(config.key_wait_timeout, None);
        assert_eq!(config.rng_seed, None);
    }

    #[test]
    fn index_overflow_thresholds() {
        assert_eq!(IndexOverflow::Addressable.flag(0xFFF), Some(0));
        assert_eq!(IndexOverflow::Addressable.flag(0x1000), Some(1));
        assert_eq!(IndexOverflow::Byte.flag(0xFF), Some(0));
        assert_eq!(IndexOverflow::Byte.flag(0x100), Some(1));
        assert_eq!(IndexOverflow::Unaffected.flag(0x1000), None);
    }

    #[test]
    fn builder_overrides_single_fields() {
        let config = MachineConfig::builder()
            .rng_seed(7)
            .key_wait_timeout(Duration::from_millis(20))
            .build();
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.key_wait_timeout, Some(Duration::from_millis(20)));
        assert_eq!(config.quirks, Quirks::default());
    }
}

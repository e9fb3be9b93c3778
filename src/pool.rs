//! Per-instrument voice storage addressed by integer handles.

use crate::backend::{AudioBackend, BufferId};
use crate::error::{Error, Result};
use crate::voice::Voice;
use crate::Note;
use slotmap::{new_key_type, Key, KeyData, SlotMap};

new_key_type! {
    struct VoiceKey;
}

/// Identifies a voice within its [VoicePool].
///
/// The low 32 bits are the 1-based slot number and the high 32 bits the
/// generation of that slot, so a handle to a freed voice is never confused
/// with the voice that later reuses its slot. Zero is [VoiceHandle::NONE].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct VoiceHandle(pub u64);

impl VoiceHandle {
    /// The reserved "no voice" handle.
    pub const NONE: Self = Self(0);

    /// Whether this is [VoiceHandle::NONE].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The 1-based slot number.
    pub fn slot(self) -> u32 {
        self.0 as u32
    }

    fn from_key(key: VoiceKey) -> Self {
        Self(key.data().as_ffi())
    }

    fn key(self) -> VoiceKey {
        KeyData::from_ffi(self.0).into()
    }
}

/// Owns the voices of one instrument.
///
/// Freed slots are recycled; live handles stay valid across other
/// allocations and releases.
#[derive(Default)]
pub struct VoicePool {
    voices: SlotMap<VoiceKey, Voice>,
    /// Highest slot number ever handed out.
    slots: u32,
}

impl VoicePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new voice bound to `buffer` and returns its handle.
    pub fn allocate(
        &mut self,
        backend: &mut impl AudioBackend,
        buffer: BufferId,
    ) -> Result<VoiceHandle> {
        let voice = Voice::attach(backend, buffer)?;
        let handle = VoiceHandle::from_key(self.voices.insert(voice));
        self.slots = self.slots.max(handle.slot());
        Ok(handle)
    }

    /// Stops the addressed voice, detaches it and frees its slot for reuse.
    ///
    /// The slot is freed even if the backend refuses to stop the voice.
    pub fn release(&mut self, backend: &mut impl AudioBackend, handle: VoiceHandle) -> Result<()> {
        if handle.is_none() {
            return Ok(());
        }
        self.check(handle)?;
        let mut voice = self
            .voices
            .remove(handle.key())
            .ok_or(Error::StaleHandle(handle.0))?;
        let result = voice.release(backend);
        voice.destroy(backend);
        result
    }

    /// Triggers the addressed voice at `note`.
    pub fn trigger(
        &mut self,
        backend: &mut impl AudioBackend,
        handle: VoiceHandle,
        note: Note,
    ) -> Result<()> {
        if handle.is_none() {
            return Ok(());
        }
        self.get_mut(handle)?.trigger(backend, note)
    }

    /// Stops the addressed voice without freeing it.
    pub fn stop(&mut self, backend: &mut impl AudioBackend, handle: VoiceHandle) -> Result<()> {
        if handle.is_none() {
            return Ok(());
        }
        self.get_mut(handle)?.release(backend)
    }

    /// Stops every playing voice, attempting all of them before reporting
    /// the first failure.
    pub fn stop_all(&mut self, backend: &mut impl AudioBackend) -> Result<()> {
        let mut result = Ok(());
        for voice in self.voices.values_mut() {
            if let Err(err) = voice.release(backend) {
                tracing::warn!("voice on emitter {} failed to stop: {}", voice.emitter().0, err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Looks up a live voice, failing for out-of-range and stale handles.
    pub fn get(&self, handle: VoiceHandle) -> Result<&Voice> {
        self.check(handle)?;
        self.voices
            .get(handle.key())
            .ok_or(Error::StaleHandle(handle.0))
    }

    /// Looks up a live voice for mutation, failing like [get](Self::get).
    pub fn get_mut(&mut self, handle: VoiceHandle) -> Result<&mut Voice> {
        self.check(handle)?;
        self.voices
            .get_mut(handle.key())
            .ok_or(Error::StaleHandle(handle.0))
    }

    /// Iterates over every live voice.
    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.values_mut()
    }

    /// Number of live voices.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether the pool holds no voices.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Number of voices currently playing.
    pub fn playing_count(&self) -> usize {
        self.voices.values().filter(|v| v.is_playing()).count()
    }

    /// Detaches and destroys every voice.
    pub fn destroy(&mut self, backend: &mut impl AudioBackend) {
        for (_, voice) in self.voices.drain() {
            voice.destroy(backend);
        }
    }

    fn check(&self, handle: VoiceHandle) -> Result<()> {
        if handle.slot() == 0 || handle.slot() > self.slots {
            return Err(Error::HandleOutOfRange {
                handle: handle.0,
                slots: self.slots as usize,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EmitterState, RecordingBackend};
    use crate::voice::VoiceState;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn handles_are_distinct_and_one_based() {
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        let handles: Vec<_> = (0..8)
            .map(|_| pool.allocate(&mut backend, BufferId(0)).unwrap())
            .collect();

        assert_eq!(handles.iter().collect::<HashSet<_>>().len(), 8);
        assert!(handles.iter().all(|h| !h.is_none()));
        let slots: Vec<_> = handles.iter().map(|h| h.slot()).collect();
        assert_eq!(slots, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn trigger_after_allocate_plays() {
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        let handle = pool.allocate(&mut backend, BufferId(0)).unwrap();
        pool.trigger(&mut backend, handle, 60).unwrap();
        assert_eq!(pool.get(handle).unwrap().state(), VoiceState::Playing);
        assert_eq!(pool.playing_count(), 1);

        pool.stop(&mut backend, handle).unwrap();
        assert_eq!(pool.get(handle).unwrap().state(), VoiceState::Stopped);
    }

    #[test]
    fn none_handle_is_a_no_op() {
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        pool.trigger(&mut backend, VoiceHandle::NONE, 60).unwrap();
        pool.stop(&mut backend, VoiceHandle::NONE).unwrap();
        pool.release(&mut backend, VoiceHandle::NONE).unwrap();
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn out_of_range_release_faults() {
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        pool.allocate(&mut backend, BufferId(0)).unwrap();
        pool.allocate(&mut backend, BufferId(0)).unwrap();

        let err = pool.release(&mut backend, VoiceHandle(3)).unwrap_err();
        assert!(matches!(err, Error::HandleOutOfRange { handle: 3, slots: 2 }));
        assert!(matches!(
            pool.trigger(&mut backend, VoiceHandle(99), 60),
            Err(Error::HandleOutOfRange { .. })
        ));
        assert_eq!(pool.len(), 2);

        // a generation with no slot number
        assert!(matches!(
            pool.get(VoiceHandle(1 << 32)),
            Err(Error::HandleOutOfRange { slots: 2, .. })
        ));
        assert!(matches!(
            pool.release(&mut backend, VoiceHandle(1 << 32)),
            Err(Error::HandleOutOfRange { .. })
        ));
    }

    #[test]
    fn released_slots_are_recycled() {
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        let a = pool.allocate(&mut backend, BufferId(0)).unwrap();
        let b = pool.allocate(&mut backend, BufferId(0)).unwrap();
        pool.trigger(&mut backend, a, 60).unwrap();

        pool.release(&mut backend, a).unwrap();
        assert_eq!(backend.state_count(EmitterState::Stopped), 1);
        assert_eq!(backend.state_count(EmitterState::Processed), 1);
        assert_eq!(pool.len(), 1);

        let c = pool.allocate(&mut backend, BufferId(0)).unwrap();
        assert_eq!(c.slot(), a.slot());
        assert_ne!(c, a);
        assert!(matches!(pool.get(a), Err(Error::StaleHandle(_))));
        assert!(pool.get(b).is_ok());
        assert!(pool.get(c).is_ok());
    }

    #[test]
    fn churn_keeps_live_handles_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut backend = RecordingBackend::new();
        let mut pool = VoicePool::new();
        let mut live = Vec::new();

        for _ in 0..500 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let handle = pool.allocate(&mut backend, BufferId(1)).unwrap();
                pool.trigger(&mut backend, handle, rng.gen_range(0..128)).unwrap();
                live.push(handle);
            } else {
                let handle = live.swap_remove(rng.gen_range(0..live.len()));
                pool.release(&mut backend, handle).unwrap();
            }
            assert_eq!(pool.len(), live.len());
        }
        assert!(live.iter().all(|h| pool.get(*h).unwrap().is_playing()));
        assert_eq!(backend.live_emitters().len(), live.len());

        pool.destroy(&mut backend);
        assert!(pool.is_empty());
        assert!(backend.live_emitters().is_empty());
    }
}

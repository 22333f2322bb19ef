//! The clock registry (`addClock`/`delClock`/.../`setGmChange`): the single
//! owner of every local hardware or software clock a time-aware system
//! exposes, keyed by `(clockIndex, domainNumber)`.

mod overlay;

pub use overlay::OverlayClock;

use crate::error::{GptpError, Result};
use crate::time::{Duration, Time};

/// A local clock a [`ClockRegistry`] can drive: a PHC, an adjtimex-steered
/// system clock, or an [`OverlayClock`] layered in software over either.
pub trait Clock {
    type Error: core::fmt::Debug;

    /// Read the clock's current time.
    fn get_ts64(&self) -> core::result::Result<Time, Self::Error>;

    /// Step the clock to an absolute time.
    fn set_ts64(&mut self, time: Time) -> core::result::Result<(), Self::Error>;

    /// Apply a continuous frequency adjustment, in parts-per-billion
    /// relative to the clock's nominal rate.
    fn set_adj(&mut self, adj_ppb: f64) -> core::result::Result<(), Self::Error>;
}

/// The role a clock entity plays within its domain.
///
/// `Master` clocks are never steered by the protocol: their time is the
/// thing everything else converges on. `SlaveMain` clocks have a writable
/// `ptpdev`, so corrections are applied directly to the hardware clock.
/// `SlaveSub` clocks share hardware with another entity and so are
/// corrected purely in software via an [`OverlayClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Master,
    SlaveMain,
    SlaveSub,
}

/// One entry in the registry: a clock plus the bookkeeping the public
/// shared-memory view and the rate/offset machinery need.
pub struct ClockEntity<C> {
    pub clock_index: u8,
    pub domain_number: u8,
    pub mode: ClockMode,
    clock: C,
    /// `offset64`: the correction currently applied on read (`tsconv`),
    /// accumulated by successive `setOffset64` calls rather than stepped
    /// onto the hardware clock directly.
    offset64: i64,
    /// `adjrate`: continuous frequency correction applied since
    /// `last_setts64`, used by shared-memory readers to extrapolate
    /// between writer updates.
    adjrate: f64,
    last_setts64: Time,
    /// Measured setup latency recorded by `addClock`, used by callers that
    /// need to compensate for the read path's own delay.
    pub ts2diff: Duration,
    gmsync: bool,
    gmchange_ind: i32,
    last_gm_phase_change_baseline: Option<i64>,
}

impl<C: Clock> ClockEntity<C> {
    fn new(clock_index: u8, domain_number: u8, clock: C, ts2diff: Duration) -> Self {
        Self {
            clock_index,
            domain_number,
            mode: ClockMode::SlaveSub,
            clock,
            offset64: 0,
            adjrate: 0.0,
            last_setts64: Time::from_fixed_nanos(0),
            ts2diff,
            gmsync: false,
            gmchange_ind: 0,
            last_gm_phase_change_baseline: None,
        }
    }
}

/// Owns every clock entity for every domain this time-aware system serves,
/// scoped by `(clockIndex, domainNumber)`.
///
/// `thisClock` for a given domain is the entity a `SlaveMain`/`SlaveSub`
/// transition via [`ClockRegistry::set_this_clock`] has designated; BMCA
/// and MD state machines read and steer it through the operations below
/// rather than touching [`Clock`] implementations directly.
pub struct ClockRegistry<C> {
    entities: arrayvec::ArrayVec<ClockEntity<C>, 32>,
    this_clock_index: Option<(u8, u8)>,
}

impl<C: Clock> Default for ClockRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ClockRegistry<C> {
    pub fn new() -> Self {
        Self {
            entities: arrayvec::ArrayVec::new(),
            this_clock_index: None,
        }
    }

    fn find_mut(&mut self, clock_index: u8, domain_number: u8) -> Result<&mut ClockEntity<C>> {
        self.entities
            .iter_mut()
            .find(|e| e.clock_index == clock_index && e.domain_number == domain_number)
            .ok_or(GptpError::Configuration("clock entity does not exist"))
    }

    fn find(&self, clock_index: u8, domain_number: u8) -> Result<&ClockEntity<C>> {
        self.entities
            .iter()
            .find(|e| e.clock_index == clock_index && e.domain_number == domain_number)
            .ok_or(GptpError::Configuration("clock entity does not exist"))
    }

    /// `addClock`: register a new clock entity. Fails if one already
    /// exists for `(clock_index, domain_number)`.
    pub fn add_clock(
        &mut self,
        clock_index: u8,
        domain_number: u8,
        clock: C,
        ts2diff: Duration,
    ) -> Result<()> {
        if self.find(clock_index, domain_number).is_ok() {
            return Err(GptpError::Configuration("clock entity already exists"));
        }
        self.entities
            .try_push(ClockEntity::new(clock_index, domain_number, clock, ts2diff))
            .map_err(|_| GptpError::Configuration("clock registry full"))
    }

    /// `delClock`: remove a clock entity. A no-op if absent.
    pub fn del_clock(&mut self, clock_index: u8, domain_number: u8) {
        self.entities
            .retain(|e| !(e.clock_index == clock_index && e.domain_number == domain_number));
        if self.this_clock_index == Some((clock_index, domain_number)) {
            self.this_clock_index = None;
        }
    }

    /// `getTs64`: the entity's hardware time, uncorrected.
    pub fn get_ts64(&self, clock_index: u8, domain_number: u8) -> Result<Time> {
        let entity = self.find(clock_index, domain_number)?;
        entity
            .clock
            .get_ts64()
            .map_err(|_| GptpError::ClockAccess("hardware clock unreadable"))
    }

    /// `setTs64`: step the entity's hardware clock to an absolute time.
    pub fn set_ts64(&mut self, clock_index: u8, domain_number: u8, time: Time) -> Result<()> {
        let entity = self.find_mut(clock_index, domain_number)?;
        entity
            .clock
            .set_ts64(time)
            .map_err(|_| GptpError::ClockAccess("hardware clock step failed"))?;
        entity.last_setts64 = time;
        Ok(())
    }

    /// `setOffset64`: accumulate a correction applied on read by
    /// [`ClockRegistry::tsconv`] rather than stepped onto hardware.
    pub fn set_offset64(
        &mut self,
        clock_index: u8,
        domain_number: u8,
        delta: Duration,
    ) -> Result<()> {
        let entity = self.find_mut(clock_index, domain_number)?;
        entity.offset64 += delta.nanos() as i64;
        Ok(())
    }

    /// `setAdj`: set the entity's continuous frequency adjustment.
    pub fn set_adj(&mut self, clock_index: u8, domain_number: u8, adj_ppb: f64) -> Result<()> {
        let entity = self.find_mut(clock_index, domain_number)?;
        entity
            .clock
            .set_adj(adj_ppb)
            .map_err(|_| GptpError::ClockAccess("frequency adjustment rejected"))?;
        entity.adjrate = adj_ppb;
        Ok(())
    }

    /// `tsconv`: read the entity's hardware time with `offset64` and the
    /// elapsed `adjrate` correction applied, matching the external reader
    /// formula `t = hw_read(ptpdev) + offset64 + adjrate*(hw_read - last_setts64)`.
    pub fn tsconv(&self, clock_index: u8, domain_number: u8) -> Result<Time> {
        let entity = self.find(clock_index, domain_number)?;
        let hw = entity
            .clock
            .get_ts64()
            .map_err(|_| GptpError::ClockAccess("hardware clock unreadable"))?;
        let elapsed = (hw - entity.last_setts64).nanos() as f64;
        let corrected_nanos =
            hw.nanos() + entity.offset64 as i128 + (entity.adjrate * elapsed / 1.0e9) as i128;
        Ok(Time::from_fixed_nanos(corrected_nanos))
    }

    /// `setThisClock`: designate the slave clock for a domain. Migrates
    /// accumulated offset/rate state from the current `thisClock` entity
    /// (if any) and switches mode to `SlaveMain` when the underlying device
    /// is writable, `SlaveSub` otherwise.
    pub fn set_this_clock(
        &mut self,
        clock_index: u8,
        domain_number: u8,
        device_writable: bool,
    ) -> Result<()> {
        if clock_index == 0 {
            return Err(GptpError::Configuration(
                "clock index 0 is reserved for the master entity",
            ));
        }
        let previous = self.this_clock_index;
        let carried_offset = match previous {
            Some((idx, dom)) if dom == domain_number => self.find(idx, dom)?.offset64,
            _ => 0,
        };

        let entity = self.find_mut(clock_index, domain_number)?;
        entity.offset64 = carried_offset;
        entity.mode = if device_writable {
            ClockMode::SlaveMain
        } else {
            ClockMode::SlaveSub
        };
        self.this_clock_index = Some((clock_index, domain_number));
        Ok(())
    }

    pub fn this_clock(&self, domain_number: u8) -> Option<u8> {
        self.this_clock_index
            .filter(|(_, dom)| *dom == domain_number)
            .map(|(idx, _)| idx)
    }

    /// `setGmSync`: mark the domain's grandmaster-sync flag true.
    pub fn set_gm_sync(&mut self, clock_index: u8, domain_number: u8) -> Result<()> {
        self.find_mut(clock_index, domain_number)?.gmsync = true;
        Ok(())
    }

    /// `resetGmSync`: clear the domain's grandmaster-sync flag.
    pub fn reset_gm_sync(&mut self, clock_index: u8, domain_number: u8) -> Result<()> {
        self.find_mut(clock_index, domain_number)?.gmsync = false;
        Ok(())
    }

    pub fn gm_sync(&self, clock_index: u8, domain_number: u8) -> Result<bool> {
        Ok(self.find(clock_index, domain_number)?.gmsync)
    }

    /// `setGmChange`: increment `gmchange_ind` and latch the
    /// `lastGmPhaseChange` baseline to the current offset, so the next
    /// `setOffset64` call can compute the delta the protocol attributes to
    /// the grandmaster change rather than routine tracking.
    pub fn set_gm_change(&mut self, clock_index: u8, domain_number: u8) -> Result<()> {
        let entity = self.find_mut(clock_index, domain_number)?;
        entity.gmchange_ind += 1;
        entity.last_gm_phase_change_baseline = Some(entity.offset64);
        Ok(())
    }

    pub fn gm_change_indicator(&self, clock_index: u8, domain_number: u8) -> Result<i32> {
        Ok(self.find(clock_index, domain_number)?.gmchange_ind)
    }

    /// The raw fields the shared-memory external view (C1) publishes
    /// verbatim, so readers can extrapolate `tsconv` themselves without
    /// calling back into this registry.
    pub fn snapshot(&self, clock_index: u8, domain_number: u8) -> Result<ClockSnapshot> {
        let entity = self.find(clock_index, domain_number)?;
        Ok(ClockSnapshot {
            gmsync: entity.gmsync,
            gmchange_ind: entity.gmchange_ind,
            offset64: entity.offset64,
            adjrate: entity.adjrate,
            last_setts64: entity.last_setts64,
        })
    }

    pub fn domain_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.entities.iter().map(|e| e.domain_number)
    }
}

/// A read-only copy of one clock entity's shared-memory-relevant fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSnapshot {
    pub gmsync: bool,
    pub gmchange_ind: i32,
    pub offset64: i64,
    pub adjrate: f64,
    pub last_setts64: Time,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeClock {
        time: Time,
    }

    impl Clock for FakeClock {
        type Error = core::convert::Infallible;

        fn get_ts64(&self) -> core::result::Result<Time, Self::Error> {
            Ok(self.time)
        }

        fn set_ts64(&mut self, time: Time) -> core::result::Result<(), Self::Error> {
            self.time = time;
            Ok(())
        }

        fn set_adj(&mut self, _adj_ppb: f64) -> core::result::Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn add_clock_then_duplicate_fails() {
        let mut registry = ClockRegistry::new();
        registry
            .add_clock(1, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        assert!(registry
            .add_clock(1, 0, FakeClock::default(), Duration::ZERO)
            .is_err());
    }

    #[test]
    fn del_clock_is_noop_if_absent() {
        let mut registry: ClockRegistry<FakeClock> = ClockRegistry::new();
        registry.del_clock(9, 0);
    }

    #[test]
    fn set_this_clock_rejects_clock_index_zero() {
        let mut registry = ClockRegistry::new();
        registry
            .add_clock(0, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        assert!(registry.set_this_clock(0, 0, true).is_err());
    }

    #[test]
    fn set_this_clock_picks_mode_from_writability() {
        let mut registry = ClockRegistry::new();
        registry
            .add_clock(1, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        registry.set_this_clock(1, 0, true).unwrap();
        assert_eq!(registry.find(1, 0).unwrap().mode, ClockMode::SlaveMain);

        registry
            .add_clock(2, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        registry.set_this_clock(2, 0, false).unwrap();
        assert_eq!(registry.find(2, 0).unwrap().mode, ClockMode::SlaveSub);
    }

    #[test]
    fn gm_change_increments_and_is_idempotent_to_read() {
        let mut registry = ClockRegistry::new();
        registry
            .add_clock(1, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        registry.set_gm_change(1, 0).unwrap();
        registry.set_gm_change(1, 0).unwrap();
        assert_eq!(registry.gm_change_indicator(1, 0).unwrap(), 2);
    }

    #[test]
    fn set_offset64_shifts_tsconv_result() {
        let mut registry = ClockRegistry::new();
        registry
            .add_clock(1, 0, FakeClock::default(), Duration::ZERO)
            .unwrap();
        registry
            .set_offset64(1, 0, Duration::from_nanos(1_000_000))
            .unwrap();
        assert_eq!(registry.tsconv(1, 0).unwrap().nanos(), 1_000_000);
    }
}

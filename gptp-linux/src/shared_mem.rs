//! C1's external view: a named shared-memory region external readers poll
//! without going through IPC, laid out exactly as documented (header plus
//! `max_domains` fixed-size per-domain entries). The mutex guarding it is a
//! plain atomics-based spinlock rather than a library type, since writers
//! only need `try_lock` semantics across a few-instruction critical section
//! and no process-shared mutex crate is part of this dependency set.

use std::sync::atomic::{AtomicU32, Ordering};

use gptp_core::clock::ClockSnapshot;
use shared_memory::{Shmem, ShmemConf, ShmemError};

const PTPDEV_LEN: usize = 32;

/// `{max_domains, active_domain, mcmutex}` followed by `max_domains`
/// [`DomainEntry`]s, matching the documented external layout byte for
/// byte (`#[repr(C)]`, no padding-sensitive reordering by the compiler).
#[repr(C)]
struct Header {
    max_domains: i32,
    active_domain: i32,
    mcmutex: AtomicU32,
}

#[repr(C)]
struct DomainEntry {
    ptpdev: [u8; PTPDEV_LEN],
    domain_number: i32,
    gmsync: u8,
    _pad: [u8; 3],
    gmchange_ind: u32,
    offset64: i64,
    adjrate: f64,
    last_setts64: i64,
}

fn region_size(max_domains: usize) -> usize {
    core::mem::size_of::<Header>() + max_domains * core::mem::size_of::<DomainEntry>()
}

/// The writer's handle, held by the daemon for its lifetime. Opens (or
/// creates, if this is the first writer) the named region and initializes
/// the header and every domain slot to empty.
pub struct SharedMemoryWriter {
    _shmem: Shmem,
    max_domains: usize,
}

impl SharedMemoryWriter {
    pub fn create(name: &str, max_domains: usize) -> std::io::Result<Self> {
        let size = region_size(max_domains);
        let shmem = match ShmemConf::new().size(size).os_id(name).create() {
            Ok(m) => m,
            Err(ShmemError::MappingIdExists) => ShmemConf::new().size(size).os_id(name).open().map_err(to_io_error)?,
            Err(e) => return Err(to_io_error(e)),
        };

        let writer = Self { _shmem: shmem, max_domains };
        writer.header_mut().max_domains = max_domains as i32;
        writer.header_mut().active_domain = -1;
        writer.header_mut().mcmutex.store(0, Ordering::Release);
        for index in 0..max_domains {
            *writer.entry_mut(index) = DomainEntry {
                ptpdev: [0; PTPDEV_LEN],
                domain_number: -1,
                gmsync: 0,
                _pad: [0; 3],
                gmchange_ind: 0,
                offset64: 0,
                adjrate: 0.0,
                last_setts64: 0,
            };
        }
        Ok(writer)
    }

    fn base_ptr(&self) -> *mut u8 {
        self._shmem.as_ptr()
    }

    fn header_mut(&self) -> &mut Header {
        unsafe { &mut *(self.base_ptr() as *mut Header) }
    }

    fn entry_mut(&self, index: usize) -> &mut DomainEntry {
        unsafe {
            let entries = self.base_ptr().add(core::mem::size_of::<Header>()) as *mut DomainEntry;
            &mut *entries.add(index)
        }
    }

    pub fn set_active_domain(&self, domain_number: u8) {
        let _guard = self.lock();
        self.header_mut().active_domain = domain_number as i32;
    }

    /// Writes one domain's public snapshot into slot `domain_index`, held
    /// across the update only — readers that lose the race simply retry.
    pub fn publish(&self, domain_index: usize, ptpdev: &str, domain_number: u8, snapshot: ClockSnapshot) {
        if domain_index >= self.max_domains {
            return;
        }
        let _guard = self.lock();
        let entry = self.entry_mut(domain_index);
        entry.ptpdev = [0; PTPDEV_LEN];
        let bytes = ptpdev.as_bytes();
        let copy_len = bytes.len().min(PTPDEV_LEN - 1);
        entry.ptpdev[..copy_len].copy_from_slice(&bytes[..copy_len]);
        entry.domain_number = domain_number as i32;
        entry.gmsync = snapshot.gmsync as u8;
        entry.gmchange_ind = snapshot.gmchange_ind as u32;
        entry.offset64 = snapshot.offset64;
        entry.adjrate = snapshot.adjrate;
        entry.last_setts64 = snapshot.last_setts64.nanos() as i64;
    }

    fn lock(&self) -> SpinlockGuard<'_> {
        let mcmutex = &self.header_mut().mcmutex;
        loop {
            if mcmutex.compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed).is_ok() {
                return SpinlockGuard { mcmutex };
            }
            std::thread::yield_now();
        }
    }
}

struct SpinlockGuard<'a> {
    mcmutex: &'a AtomicU32,
}

impl Drop for SpinlockGuard<'_> {
    fn drop(&mut self) {
        self.mcmutex.store(0, Ordering::Release);
    }
}

fn to_io_error(err: ShmemError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_size_accounts_for_header_and_every_domain_slot() {
        let size = region_size(4);
        assert!(size > core::mem::size_of::<Header>());
        assert_eq!(size, core::mem::size_of::<Header>() + 4 * core::mem::size_of::<DomainEntry>());
    }
}

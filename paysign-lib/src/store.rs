//! Platform certificate store.
//!
//! The store holds an immutable [`CertificateSet`] behind an `Arc`. Readers
//! take a snapshot and work against it for the whole verification; writers
//! build a new set and swap it in. A verification therefore sees either the
//! set before a refresh or the set after it, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{CertificateError, PlatformCertificate};

/// Immutable set of trusted platform certificates, keyed by serial number.
#[derive(Clone, Debug, Default)]
pub struct CertificateSet {
    by_serial: HashMap<String, PlatformCertificate>,
}

impl CertificateSet {
    /// Build a set, rejecting duplicate serials.
    pub fn new(
        certificates: impl IntoIterator<Item = PlatformCertificate>,
    ) -> Result<Self, CertificateError> {
        let mut by_serial = HashMap::new();
        for certificate in certificates {
            let serial = certificate.serial_no().to_string();
            if by_serial.insert(serial.clone(), certificate).is_some() {
                return Err(CertificateError::DuplicateSerial(serial));
            }
        }
        Ok(Self { by_serial })
    }

    /// Exact serial lookup.
    pub fn get(&self, serial_no: &str) -> Option<&PlatformCertificate> {
        self.by_serial.get(serial_no)
    }

    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }

    /// Iterate in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &PlatformCertificate> {
        self.by_serial.values()
    }

    /// The valid certificate expiring last, ties broken by serial.
    ///
    /// This is the certificate to encrypt outbound sensitive fields for.
    pub fn newest_valid(&self, now: i64) -> Option<&PlatformCertificate> {
        self.by_serial
            .values()
            .filter(|c| c.is_valid_at(now))
            .max_by(|a, b| {
                a.not_after()
                    .cmp(&b.not_after())
                    .then_with(|| a.serial_no().cmp(b.serial_no()))
            })
    }
}

/// Shared store of trusted platform certificates.
///
/// Populated and refreshed by the caller; verification only reads.
#[derive(Debug, Default)]
pub struct PlatformCertificateStore {
    current: RwLock<Arc<CertificateSet>>,
}

impl PlatformCertificateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `certificates`.
    pub fn with_certificates(
        certificates: impl IntoIterator<Item = PlatformCertificate>,
    ) -> Result<Self, CertificateError> {
        Ok(Self {
            current: RwLock::new(Arc::new(CertificateSet::new(certificates)?)),
        })
    }

    /// Current set. Holds no lock once returned.
    pub fn snapshot(&self) -> Arc<CertificateSet> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Look up a certificate by exact serial in the current set.
    pub fn get(&self, serial_no: &str) -> Option<PlatformCertificate> {
        self.snapshot().get(serial_no).cloned()
    }

    /// Replace the whole set atomically. Returns the new size.
    ///
    /// On a duplicate serial the store is left untouched.
    pub fn replace_all(
        &self,
        certificates: impl IntoIterator<Item = PlatformCertificate>,
    ) -> Result<usize, CertificateError> {
        let set = CertificateSet::new(certificates)?;
        let count = set.len();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(set);
        tracing::info!(count, "replaced platform certificate set");
        Ok(count)
    }

    /// Insert or overwrite one certificate. Returns true if the serial is new.
    pub fn upsert(&self, certificate: PlatformCertificate) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = CertificateSet::clone(&current);
        let serial = certificate.serial_no().to_string();
        let added = next.by_serial.insert(serial.clone(), certificate).is_none();
        *current = Arc::new(next);
        tracing::info!(serial_no = %serial, added, "stored platform certificate");
        added
    }

    /// Insert or overwrite several certificates in one swap. Returns how
    /// many serials were new.
    pub fn upsert_all(&self, certificates: impl IntoIterator<Item = PlatformCertificate>) -> usize {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = CertificateSet::clone(&current);
        let mut added = 0;
        for certificate in certificates {
            if next
                .by_serial
                .insert(certificate.serial_no().to_string(), certificate)
                .is_none()
            {
                added += 1;
            }
        }
        *current = Arc::new(next);
        tracing::info!(added, total = current.len(), "merged platform certificates");
        added
    }

    /// Remove one certificate by serial.
    pub fn remove(&self, serial_no: &str) -> Option<PlatformCertificate> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if !current.by_serial.contains_key(serial_no) {
            return None;
        }
        let mut next = CertificateSet::clone(&current);
        let removed = next.by_serial.remove(serial_no);
        *current = Arc::new(next);
        removed
    }

    /// Drop every certificate expired at `now`. Returns how many went.
    pub fn remove_expired(&self, now: i64) -> usize {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = CertificateSet::clone(&current);
        next.by_serial.retain(|_, c| !c.is_expired_at(now));
        let removed = current.len() - next.len();
        if removed > 0 {
            *current = Arc::new(next);
            tracing::info!(removed, "pruned expired platform certificates");
        }
        removed
    }

    /// Serials in the current set, sorted.
    pub fn serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self
            .snapshot()
            .iter()
            .map(|c| c.serial_no().to_string())
            .collect();
        serials.sort();
        serials
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// See [`CertificateSet::newest_valid`].
    pub fn newest_valid(&self, now: i64) -> Option<PlatformCertificate> {
        self.snapshot().newest_valid(now).cloned()
    }
}

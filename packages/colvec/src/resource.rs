//! System resource detection for the memory budget.
//!
//! Detects total and available RAM and derives the byte budget the
//! memory manager keeps resident segments under when no explicit budget
//! is configured. Stateless: each call to `MemoryBudget::auto_detect()`
//! re-probes the system.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

// ── Constants ───────────────────────────────────────────────────────

const MB: usize = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// Budget floor (64 MB).
const BUDGET_MIN: usize = 64 * MB;

/// Budget ceiling (16 GB).
const BUDGET_MAX: usize = 16 * GB as usize;

/// Fraction of available memory handed to resident segments.
const BUDGET_FRACTION: f64 = 0.25;

// ── SystemResources ─────────────────────────────────────────────────

/// Snapshot of detected memory.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total physical RAM in bytes.
    pub total_memory_bytes: u64,
    /// Available (re-usable) RAM in bytes.
    pub available_memory_bytes: u64,
}

impl SystemResources {
    /// Probe the current system for RAM information.
    pub fn detect() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        Self {
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
        }
    }

    /// Memory pressure indicator (0.0 = no pressure, 1.0 = critical).
    pub fn memory_pressure(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 1.0;
        }
        let ratio = self.available_memory_bytes as f64 / self.total_memory_bytes as f64;
        (1.0 - ratio).clamp(0.0, 1.0)
    }
}

// ── MemoryBudget ────────────────────────────────────────────────────

/// Byte budget for resident segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub bytes: usize,
}

impl MemoryBudget {
    pub fn new(bytes: usize) -> Self {
        Self { bytes }
    }

    /// `clamp(available * 0.25, 64 MB, 16 GB)`.
    pub fn from_resources(res: &SystemResources) -> Self {
        let raw = (res.available_memory_bytes as f64 * BUDGET_FRACTION) as usize;
        Self {
            bytes: raw.clamp(BUDGET_MIN, BUDGET_MAX),
        }
    }

    /// Probe the system and derive a budget.
    pub fn auto_detect() -> Self {
        let resources = SystemResources::detect();
        let budget = Self::from_resources(&resources);
        tracing::debug!(
            budget_bytes = budget.bytes,
            pressure = resources.memory_pressure(),
            "detected memory budget"
        );
        budget
    }
}

// ── Tests ───────────────────────────────────────────────────────────

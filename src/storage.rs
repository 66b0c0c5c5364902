//! Binary policy files.
//!
//! Format: 32-byte header followed by fixed-size little-endian records sorted
//! by their 8-byte key, so lookups are a binary search over the mapped file.
//!
//! ```text
//! header  magic u32 | version u32 | event u32 | records u32 | start_ev f64 | start_sd f64
//! sprint  stage u8 | rerolls u8 | d1..d4 u8 | first_set_score i8 | pad u8
//!         | freeze_ev f64 | freeze_sd f64 | reroll_ev f64 | reroll_sd f64 | action u8 | pad[7]
//! jump    phase u8 | frozen_sum u8 | n1..n6 u8
//!         | best_ev f64 | best_sd f64 | action u8 | pad[7]
//! ```
//!
//! Absent reroll values are stored as NaN. A jump action byte is the number of
//! dice frozen (0 = stop).

use std::cmp::Ordering;
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;

use memmap2::Mmap;
use tracing::info;

use crate::constants::*;
use crate::error::{DecathlonError, Result};
use crate::long_jump::{JumpAction, JumpPhase, JumpSolver, JumpState};
use crate::sprint::{SprintAction, SprintSolver, SprintStage, SprintState};

const KEY_SIZE: usize = 8;
pub const SPRINT_RECORD_SIZE: usize = 48;
pub const JUMP_RECORD_SIZE: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Sprint = 1,
    LongJump = 2,
}

impl EventKind {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(EventKind::Sprint),
            2 => Some(EventKind::LongJump),
            _ => None,
        }
    }

    fn record_size(self) -> usize {
        match self {
            EventKind::Sprint => SPRINT_RECORD_SIZE,
            EventKind::LongJump => JUMP_RECORD_SIZE,
        }
    }
}

/// Stored sprint entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SprintEntry {
    pub freeze_ev: f64,
    pub freeze_sd: f64,
    /// `(ev, sd)` of rerolling; `None` with no rerolls left.
    pub reroll: Option<(f64, f64)>,
    pub action: SprintAction,
}

/// Stored long jump entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpEntry {
    pub ev: f64,
    pub sd: f64,
    pub action: JumpAction,
}

fn sprint_key(state: &SprintState) -> [u8; KEY_SIZE] {
    let d = state.dice();
    let (stage, score) = match state.stage() {
        SprintStage::FirstSet => (0, 0i8),
        SprintStage::SecondSet { first_set_score } => (1, first_set_score as i8),
    };
    [stage, state.rerolls(), d[0], d[1], d[2], d[3], score as u8, 0]
}

fn jump_key(state: &JumpState) -> [u8; KEY_SIZE] {
    let (phase, frozen_sum) = match state.phase() {
        JumpPhase::RunUp { frozen_sum } => (0, frozen_sum),
        JumpPhase::Jump => (1, 0),
    };
    let c = state.roll().counts();
    [phase, frozen_sum, c[0], c[1], c[2], c[3], c[4], c[5]]
}

fn header_bytes(kind: EventKind, records: usize, start_ev: f64, start_sd: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(POLICY_HEADER_SIZE);
    buf.extend_from_slice(&POLICY_FILE_MAGIC.to_le_bytes());
    buf.extend_from_slice(&POLICY_FILE_VERSION.to_le_bytes());
    buf.extend_from_slice(&(kind as u32).to_le_bytes());
    buf.extend_from_slice(&(records as u32).to_le_bytes());
    buf.extend_from_slice(&start_ev.to_le_bytes());
    buf.extend_from_slice(&start_sd.to_le_bytes());
    buf
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Write every solved sprint state to `path`.
pub fn save_sprint_policy(solver: &mut SprintSolver, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let t0 = Instant::now();
    let start = solver.start_moments();

    let mut records: Vec<[u8; SPRINT_RECORD_SIZE]> = solver
        .results()
        .map(|(state, res)| {
            let mut rec = [0u8; SPRINT_RECORD_SIZE];
            rec[..KEY_SIZE].copy_from_slice(&sprint_key(state));
            let (reroll_ev, reroll_sd) = res.reroll.map_or((f64::NAN, f64::NAN), |m| (m.ev, m.sd()));
            rec[8..16].copy_from_slice(&res.freeze.ev.to_le_bytes());
            rec[16..24].copy_from_slice(&res.freeze.sd().to_le_bytes());
            rec[24..32].copy_from_slice(&reroll_ev.to_le_bytes());
            rec[32..40].copy_from_slice(&reroll_sd.to_le_bytes());
            rec[40] = match res.action {
                SprintAction::Freeze => 0,
                SprintAction::Reroll => 1,
            };
            rec
        })
        .collect();
    records.sort_unstable_by(|a, b| a[..KEY_SIZE].cmp(&b[..KEY_SIZE]));

    let mut bytes = header_bytes(EventKind::Sprint, records.len(), start.ev, start.sd());
    bytes.reserve(records.len() * SPRINT_RECORD_SIZE);
    for rec in &records {
        bytes.extend_from_slice(rec);
    }
    write_file(path, &bytes)?;

    info!(
        path = %path.display(),
        records = records.len(),
        bytes = bytes.len(),
        ms = t0.elapsed().as_secs_f64() * 1000.0,
        "sprint policy saved"
    );
    Ok(())
}

/// Write every solved long jump decision point to `path`.
pub fn save_jump_policy(solver: &mut JumpSolver, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let t0 = Instant::now();
    let start = solver.attempt_moments();

    let mut records: Vec<[u8; JUMP_RECORD_SIZE]> = solver
        .results()
        .map(|(state, res)| {
            let mut rec = [0u8; JUMP_RECORD_SIZE];
            rec[..KEY_SIZE].copy_from_slice(&jump_key(state));
            rec[8..16].copy_from_slice(&res.best.ev.to_le_bytes());
            rec[16..24].copy_from_slice(&res.best.sd().to_le_bytes());
            rec[24] = res.action.freeze_count();
            rec
        })
        .collect();
    records.sort_unstable_by(|a, b| a[..KEY_SIZE].cmp(&b[..KEY_SIZE]));

    let mut bytes = header_bytes(EventKind::LongJump, records.len(), start.ev, start.sd());
    bytes.reserve(records.len() * JUMP_RECORD_SIZE);
    for rec in &records {
        bytes.extend_from_slice(rec);
    }
    write_file(path, &bytes)?;

    info!(
        path = %path.display(),
        records = records.len(),
        bytes = bytes.len(),
        ms = t0.elapsed().as_secs_f64() * 1000.0,
        "long jump policy saved"
    );
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(b)
}

fn read_f64(bytes: &[u8], at: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[at..at + 8]);
    f64::from_le_bytes(b)
}

/// Memory-mapped, validated policy file.
pub struct PolicyFile {
    mmap: Mmap,
    kind: EventKind,
    records: usize,
    start_ev: f64,
    start_sd: f64,
}

impl PolicyFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let t0 = Instant::now();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < POLICY_HEADER_SIZE {
            return Err(DecathlonError::InvalidPolicyFile(format!(
                "{}: {} bytes is shorter than the header",
                path.display(),
                mmap.len()
            )));
        }
        let magic = read_u32(&mmap, 0);
        let version = read_u32(&mmap, 4);
        if magic != POLICY_FILE_MAGIC || version != POLICY_FILE_VERSION {
            return Err(DecathlonError::InvalidPolicyFile(format!(
                "{}: magic=0x{magic:08x} version={version}",
                path.display()
            )));
        }
        let kind_raw = read_u32(&mmap, 8);
        let kind = EventKind::from_u32(kind_raw).ok_or_else(|| {
            DecathlonError::InvalidPolicyFile(format!(
                "{}: unknown event kind {kind_raw}",
                path.display()
            ))
        })?;
        let records = read_u32(&mmap, 12) as usize;
        let expected = POLICY_HEADER_SIZE + records * kind.record_size();
        if mmap.len() != expected {
            return Err(DecathlonError::InvalidPolicyFile(format!(
                "{}: size mismatch, expected {expected} bytes, got {}",
                path.display(),
                mmap.len()
            )));
        }
        let start_ev = read_f64(&mmap, 16);
        let start_sd = read_f64(&mmap, 24);

        info!(
            path = %path.display(),
            ?kind,
            records,
            ms = t0.elapsed().as_secs_f64() * 1000.0,
            "policy file mapped"
        );
        Ok(Self {
            mmap,
            kind,
            records,
            start_ev,
            start_sd,
        })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// `(ev, sd)` before the first roll.
    pub fn start(&self) -> (f64, f64) {
        (self.start_ev, self.start_sd)
    }

    fn record(&self, i: usize) -> &[u8] {
        let size = self.kind.record_size();
        let at = POLICY_HEADER_SIZE + i * size;
        &self.mmap[at..at + size]
    }

    fn find(&self, key: &[u8; KEY_SIZE]) -> Option<&[u8]> {
        let (mut lo, mut hi) = (0, self.records);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let rec = self.record(mid);
            match rec[..KEY_SIZE].cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(rec),
            }
        }
        None
    }

    fn expect_kind(&self, kind: EventKind) -> Result<()> {
        if self.kind != kind {
            return Err(DecathlonError::InvalidPolicyFile(format!(
                "expected a {kind:?} policy, file holds {:?}",
                self.kind
            )));
        }
        Ok(())
    }

    /// Look up a sprint state. `Ok(None)` if the state was never solved.
    pub fn lookup_sprint(&self, state: &SprintState) -> Result<Option<SprintEntry>> {
        self.expect_kind(EventKind::Sprint)?;
        let Some(rec) = self.find(&sprint_key(state)) else {
            return Ok(None);
        };
        let action = match rec[40] {
            0 => SprintAction::Freeze,
            1 => SprintAction::Reroll,
            b => {
                return Err(DecathlonError::InvalidPolicyFile(format!(
                    "bad sprint action byte {b}"
                )))
            }
        };
        let reroll_ev = read_f64(rec, 24);
        let reroll_sd = read_f64(rec, 32);
        Ok(Some(SprintEntry {
            freeze_ev: read_f64(rec, 8),
            freeze_sd: read_f64(rec, 16),
            reroll: (!reroll_ev.is_nan()).then_some((reroll_ev, reroll_sd)),
            action,
        }))
    }

    /// Look up a long jump decision point. `Ok(None)` if it was never solved.
    pub fn lookup_jump(&self, state: &JumpState) -> Result<Option<JumpEntry>> {
        self.expect_kind(EventKind::LongJump)?;
        let Some(rec) = self.find(&jump_key(state)) else {
            return Ok(None);
        };
        let k = rec[24];
        if k as usize > JUMP_DICE {
            return Err(DecathlonError::InvalidPolicyFile(format!(
                "bad jump action byte {k}"
            )));
        }
        Ok(Some(JumpEntry {
            ev: read_f64(rec, 8),
            sd: read_f64(rec, 16),
            action: JumpAction::from_freeze_count(k),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice_mechanics::Outcome;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("decathlon_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_sprint_round_trip() {
        let mut solver = SprintSolver::default();
        let s = SprintState::second_set(3, 2, [6, 1, 4, 4]).unwrap();
        let res = solver.solve(s);
        let path = temp_path("sprint.bin");
        save_sprint_policy(&mut solver, &path).unwrap();

        let file = PolicyFile::open(&path).unwrap();
        assert_eq!(file.kind(), EventKind::Sprint);
        assert_eq!(file.len(), solver.len());
        let entry = file.lookup_sprint(&s).unwrap().unwrap();
        assert_eq!(entry.action, res.action);
        assert_eq!(entry.freeze_ev, res.freeze.ev);
        assert_eq!(entry.reroll.map(|r| r.0), res.reroll.map(|m| m.ev));

        let none = SprintState::second_set(3, 0, [1, 1, 1, 1]).unwrap();
        let zero = file.lookup_sprint(&none).unwrap().unwrap();
        assert_eq!(zero.reroll, None);
        assert!(file.lookup_jump(&JumpState::jump(Outcome::from_dice(&[1]).unwrap()).unwrap()).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_jump_round_trip() {
        let mut solver = JumpSolver::default();
        let s = JumpState::run_up(3, Outcome::from_dice(&[1, 2, 6]).unwrap()).unwrap();
        let res = solver.solve(s);
        let path = temp_path("jump.bin");
        save_jump_policy(&mut solver, &path).unwrap();

        let file = PolicyFile::open(&path).unwrap();
        assert_eq!(file.kind(), EventKind::LongJump);
        let entry = file.lookup_jump(&s).unwrap().unwrap();
        assert_eq!(entry.action, res.action);
        assert_eq!(entry.ev, res.best.ev);
        assert_eq!(file.start().0, solver.attempt_moments().ev);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let path = temp_path("corrupt.bin");
        fs::write(&path, [0u8; 16]).unwrap();
        assert!(matches!(
            PolicyFile::open(&path),
            Err(DecathlonError::InvalidPolicyFile(_))
        ));

        let mut bytes = header_bytes(EventKind::Sprint, 3, 0.0, 0.0);
        bytes.extend_from_slice(&[0u8; SPRINT_RECORD_SIZE]);
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            PolicyFile::open(&path),
            Err(DecathlonError::InvalidPolicyFile(_))
        ));

        bytes[0] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        assert!(PolicyFile::open(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}

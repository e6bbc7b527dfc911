// The "dungeon": bounded particle-population store for one time step.
//
// An arena of fixed capacity plus a logical length `pop`. Slots at
// `pop..capacity` hold stale records and are unreachable through the API:
// every index-taking operation is bounds-checked against the logical
// length, never the physical capacity. The store is a stack for sequential
// secondary-particle collection and a flat array for per-index parallel
// access; callers partition index ranges disjointly, there is no internal
// locking.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};
use nalgebra::Vector3;
use rand::Rng;

use crate::error::{TransportError, TransportResult};
use crate::particle::ParticleRecord;
use crate::utilities::attempt;

/// Default proximity cutoff for pairwise merging, in problem length units.
/// Inherited from long-standing practice; treat as a tuning knob, not
/// physics (see DESIGN.md).
pub const DEFAULT_MERGE_RADIUS: f64 = 0.2;

/// Merge-candidate attempts allowed per particle of current population.
const MERGE_ATTEMPTS_PER_POP: usize = 100;

#[derive(Debug, Clone)]
pub struct Dungeon {
    records: Vec<ParticleRecord>,
    pop: usize,
    /// Cross-cycle normalization hand-off; not used by any internal
    /// invariant.
    pub k_eff: f64,
    merge_radius: f64,
}

impl Dungeon {
    /// Allocate backing storage for up to `max_size` records.
    pub fn new(max_size: usize) -> TransportResult<Self> {
        if max_size == 0 {
            return Err(TransportError::InvalidTarget {
                target: 0,
                capacity: 0,
            });
        }
        Ok(Self {
            records: vec![ParticleRecord::default(); max_size],
            pop: 0,
            k_eff: 1.0,
            merge_radius: DEFAULT_MERGE_RADIUS,
        })
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.pop
    }

    pub fn is_empty(&self) -> bool {
        self.pop == 0
    }

    pub fn merge_radius(&self) -> f64 {
        self.merge_radius
    }

    pub fn set_merge_radius(&mut self, radius: f64) -> TransportResult<()> {
        if radius <= 0.0 || !radius.is_finite() {
            return Err(TransportError::InvalidConfig(format!(
                "merge radius must be positive and finite, got {}",
                radius
            )));
        }
        self.merge_radius = radius;
        Ok(())
    }

    /// Stack push. Single logical writer per cycle phase.
    pub fn detain(&mut self, record: ParticleRecord) -> TransportResult<()> {
        if self.pop == self.records.len() {
            return Err(TransportError::CapacityExceeded {
                pop: self.pop,
                capacity: self.records.len(),
            });
        }
        self.records[self.pop] = record;
        self.pop += 1;
        Ok(())
    }

    /// Stack pop; the returned record is marked alive for reuse.
    pub fn release(&mut self) -> TransportResult<ParticleRecord> {
        if self.pop == 0 {
            return Err(TransportError::EmptyStore);
        }
        self.pop -= 1;
        let mut record = self.records[self.pop].clone();
        record.alive = true;
        Ok(record)
    }

    fn check_index(&self, index: usize) -> TransportResult<()> {
        if index >= self.pop {
            return Err(TransportError::IndexOutOfBounds {
                index,
                pop: self.pop,
            });
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> TransportResult<&ParticleRecord> {
        self.check_index(index)?;
        Ok(&self.records[index])
    }

    pub fn copy(&self, index: usize) -> TransportResult<ParticleRecord> {
        self.get(index).cloned()
    }

    pub fn replace(&mut self, record: ParticleRecord, index: usize) -> TransportResult<()> {
        self.check_index(index)?;
        self.records[index] = record;
        Ok(())
    }

    /// Live records, `0..pop`.
    pub fn live(&self) -> &[ParticleRecord] {
        &self.records[..self.pop]
    }

    /// Sum of weights over the live population.
    pub fn total_weight(&self) -> f64 {
        self.live().iter().map(|r| r.weight).sum()
    }

    /// Force the logical population to exactly `n`, growing the backing
    /// storage if needed. Every slot is reset to the dead sentinel first,
    /// so all `n` records start in a defined default state.
    pub fn set_size(&mut self, n: usize) -> TransportResult<()> {
        if n == 0 {
            return Err(TransportError::InvalidTarget {
                target: 0,
                capacity: self.records.len(),
            });
        }
        if n > self.records.len() {
            self.records.resize(n, ParticleRecord::default());
        }
        for record in &mut self.records {
            *record = ParticleRecord::default();
        }
        self.pop = n;
        Ok(())
    }

    /// O(1) logical clear; storage is untouched.
    pub fn clean(&mut self) {
        self.pop = 0;
    }

    /// Rescale every weight by one global factor so the total becomes
    /// exactly `target`.
    pub fn norm_weight(&mut self, target: f64) -> TransportResult<()> {
        if self.pop == 0 {
            return Err(TransportError::EmptyStore);
        }
        if target <= 0.0 || !target.is_finite() {
            return Err(TransportError::InvalidConfig(format!(
                "weight target must be positive and finite, got {}",
                target
            )));
        }
        let current = self.total_weight();
        if current <= 0.0 {
            return Err(TransportError::InvalidConfig(format!(
                "cannot renormalize population with total weight {}",
                current
            )));
        }
        let factor = target / current;
        for record in &mut self.records[..self.pop] {
            record.weight *= factor;
        }
        Ok(())
    }

    /// Reservoir-style resample to exactly `n` records.
    ///
    /// Reducing keeps an unweighted uniform subsample of the original
    /// population; growing clones uniformly chosen existing records. Total
    /// weight is NOT conserved; follow with [`Dungeon::norm_weight`] when
    /// the energy balance matters.
    pub fn norm_size<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> TransportResult<()> {
        if n == 0 || n > self.records.len() {
            return Err(TransportError::InvalidTarget {
                target: n,
                capacity: self.records.len(),
            });
        }
        if self.pop == 0 {
            return Err(TransportError::EmptyStore);
        }
        if n < self.pop {
            for i in n..self.pop {
                let j = rand_index(i, rng);
                if j < n {
                    self.records[j] = self.records[i].clone();
                }
            }
        } else {
            while self.pop < n {
                let j = rand_index(self.pop, rng);
                self.records[self.pop] = self.records[j].clone();
                self.pop += 1;
            }
        }
        self.pop = n;
        Ok(())
    }

    /// Reduce the population to `n` while conserving total weight, by
    /// repeatedly merging random pairs of same-kind records that lie within
    /// the merge radius of each other.
    ///
    /// The candidate search is bounded (proportional to the current
    /// population); a population too dispersed to merge is a fatal error,
    /// not an infinite loop.
    pub fn reduce_size<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> TransportResult<()> {
        if n == 0 || n > self.records.len() {
            return Err(TransportError::InvalidTarget {
                target: n,
                capacity: self.records.len(),
            });
        }
        let radius2 = self.merge_radius * self.merge_radius;
        while self.pop > n {
            let tries = MERGE_ATTEMPTS_PER_POP * self.pop;
            let pair = attempt(tries, || {
                let i = rand_index(self.pop, rng);
                let j = rand_index(self.pop, rng);
                if i == j {
                    return None;
                }
                let (a, b) = (&self.records[i], &self.records[j]);
                if a.kind != b.kind {
                    return None;
                }
                if distance2(a.position, b.position) > radius2 {
                    return None;
                }
                Some((i, j))
            });
            match pair {
                Some((keep, remove)) => self.combine(keep, remove)?,
                None => {
                    return Err(TransportError::SearchExhausted {
                        context: format!(
                            "merge-candidate search at pop {} toward target {}",
                            self.pop, n
                        ),
                        attempts: tries,
                    })
                }
            }
        }
        Ok(())
    }

    /// Cap the population of every region at `cap`: while a region holds
    /// more than `cap` records, merge one excess record into its
    /// geometrically nearest kept record in the same region.
    ///
    /// `region_of` maps a record to its region id (typically the material
    /// index). Conserves total weight.
    pub fn reduce_size_by_region<F>(&mut self, cap: usize, region_of: F) -> TransportResult<()>
    where
        F: Fn(&ParticleRecord) -> usize,
    {
        if cap == 0 {
            return Err(TransportError::InvalidTarget {
                target: 0,
                capacity: self.records.len(),
            });
        }
        // Each merge removes one record, so the initial population bounds
        // the whole pass.
        let max_merges = self.pop;
        for _ in 0..max_merges {
            let Some((keep, remove)) = self.find_region_merge(cap, &region_of) else {
                return Ok(());
            };
            self.combine(keep, remove)?;
        }
        // Every merge shrinks an over-cap region, so falling out of the
        // loop with one still over cap means the bookkeeping is broken.
        match self.find_region_merge(cap, &region_of) {
            None => Ok(()),
            Some(_) => Err(TransportError::SearchExhausted {
                context: "per-region population capping".into(),
                attempts: max_merges,
            }),
        }
    }

    /// Locate one (nearest-kept, excess) pair in some over-populated
    /// region, scanning the live population.
    fn find_region_merge<F>(&self, cap: usize, region_of: &F) -> Option<(usize, usize)>
    where
        F: Fn(&ParticleRecord) -> usize,
    {
        let mut counts: std::collections::HashMap<usize, Vec<usize>> =
            std::collections::HashMap::new();
        for (i, record) in self.live().iter().enumerate() {
            counts.entry(region_of(record)).or_default().push(i);
        }
        for indices in counts.values() {
            if indices.len() <= cap {
                continue;
            }
            // An over-cap region holds at least cap + 1 >= 2 records, so
            // both the excess and a nearest neighbor exist.
            let excess = *indices.last()?;
            let excess_pos = self.records[excess].position;
            let nearest = indices
                .iter()
                .copied()
                .filter(|&i| i != excess)
                .min_by(|&a, &b| {
                    let da = distance2(self.records[a].position, excess_pos);
                    let db = distance2(self.records[b].position, excess_pos);
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })?;
            return Some((nearest, excess));
        }
        None
    }

    /// The single merge primitive every reduction is built on: combine
    /// `remove` into `keep` with a weight-averaged position and summed
    /// weight, then delete `remove` by moving the last live record into its
    /// slot.
    pub fn combine(&mut self, keep: usize, remove: usize) -> TransportResult<()> {
        self.check_index(keep)?;
        self.check_index(remove)?;
        if keep == remove {
            return Err(TransportError::InvalidConfig(format!(
                "combine needs two distinct slots, got {} twice",
                keep
            )));
        }
        let (a, b) = (&self.records[keep], &self.records[remove]);
        if a.kind != b.kind {
            return Err(TransportError::KindMismatch {
                a: a.kind,
                b: b.kind,
            });
        }
        let (w1, w2) = (a.weight, b.weight);
        let total = w1 + w2;
        let p1 = Vector3::from(a.position);
        let p2 = Vector3::from(b.position);
        // A zero-weight pair carries no energy; the midpoint is as good a
        // home as any.
        let merged = if total > 0.0 {
            (p1 * w1 + p2 * w2) / total
        } else {
            (p1 + p2) * 0.5
        };
        let record = &mut self.records[keep];
        record.position = [merged.x, merged.y, merged.z];
        record.weight = total;
        if remove != self.pop - 1 {
            self.records[remove] = self.records[self.pop - 1].clone();
        }
        self.pop -= 1;
        Ok(())
    }

    /// Diagnostic dump of the first `max` live records.
    pub fn print_to_screen(&self, max: usize) {
        println!("dungeon: pop {} of {}", self.pop, self.records.len());
        for (i, r) in self.live().iter().take(max).enumerate() {
            println!(
                "  [{}] pos ({:.4}, {:.4}, {:.4})  w {:.6e}  mat {}  {:?}  alive {}",
                i, r.position[0], r.position[1], r.position[2], r.weight, r.mat_index, r.kind,
                r.alive
            );
        }
    }

    /// Same dump, to a file.
    pub fn print_to_file<P: AsRef<Path>>(&self, path: P, max: usize) -> TransportResult<()> {
        let mut file = File::create(path)?;
        writeln!(file, "dungeon: pop {} of {}", self.pop, self.records.len())?;
        for (i, r) in self.live().iter().take(max).enumerate() {
            writeln!(
                file,
                "{} {} {} {} {} {} {:?} {}",
                i, r.position[0], r.position[1], r.position[2], r.weight, r.mat_index, r.kind,
                r.alive
            )?;
        }
        Ok(())
    }
}

/// Population control applied at a step boundary: cap per-region counts
/// with the weight-conserving nearest-neighbor merge, logging how much the
/// census shrank.
pub fn control_population<F>(
    store: &mut Dungeon,
    region_cap: Option<usize>,
    region_of: F,
) -> TransportResult<()>
where
    F: Fn(&ParticleRecord) -> usize,
{
    let before = store.len();
    if let Some(cap) = region_cap {
        store.reduce_size_by_region(cap, region_of)?;
    }
    if store.len() < before {
        debug!("population control: {} -> {} records", before, store.len());
    }
    if store.len() == store.capacity() {
        warn!(
            "census store is full ({} records); next step's emission may overflow",
            store.len()
        );
    }
    Ok(())
}

#[inline]
fn rand_index<R: Rng + ?Sized>(n: usize, rng: &mut R) -> usize {
    ((rng.gen::<f64>() * n as f64) as usize).min(n - 1)
}

#[inline]
fn distance2(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

//! Frame-index selection.
//!
//! Given a total image budget and the frame count of each input, this module
//! decides how many images each input contributes ([`allocate`]) and which
//! frame indices to take from it ([`uniform_indices`]). [`SamplingPlan`] ties
//! both together with output numbering.
//!
//! All arithmetic is integer-only, so a plan is fully deterministic: the same
//! inputs and budget always select the same frames.
//!
//! # Example
//!
//! ```
//! use stillframe::sampling::{allocate, uniform_indices};
//!
//! // 10 images from two videos of 300 and 100 frames.
//! assert_eq!(allocate(10, &[300, 100], true), vec![7, 3]);
//! assert_eq!(uniform_indices(100, 3), vec![0, 33, 66]);
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use crate::metadata::MediaMetadata;

/// Split `budget` images across inputs in proportion to `frame_counts`.
///
/// - When the budget covers every frame, each input gets its full count.
/// - With `ensure_each`, every non-empty input is first given one image as
///   long as the budget allows it; the rest is shared proportionally.
/// - Shares are rounded with the largest-remainder method, ties going to the
///   earlier input.
///
/// The result always sums to `min(budget, sum(frame_counts))` and never gives
/// an input more images than it has frames.
pub fn allocate(budget: u64, frame_counts: &[u64], ensure_each: bool) -> Vec<u64> {
    let total: u128 = frame_counts.iter().map(|&count| u128::from(count)).sum();
    if u128::from(budget) >= total {
        return frame_counts.to_vec();
    }

    let mut quotas = vec![0_u64; frame_counts.len()];
    let mut capacities = frame_counts.to_vec();
    let mut remaining = budget;

    if ensure_each {
        let non_empty = frame_counts.iter().filter(|&&count| count > 0).count() as u64;
        if non_empty > 0 && non_empty <= budget {
            for (quota, capacity) in quotas.iter_mut().zip(capacities.iter_mut()) {
                if *capacity > 0 {
                    *quota = 1;
                    *capacity -= 1;
                }
            }
            remaining -= non_empty;
        }
    }

    for (quota, share) in quotas.iter_mut().zip(apportion(remaining, &capacities)) {
        *quota += share;
    }

    quotas
}

/// Largest-remainder apportionment of `budget` over `capacities`.
fn apportion(budget: u64, capacities: &[u64]) -> Vec<u64> {
    let total: u128 = capacities.iter().map(|&c| u128::from(c)).sum();
    if total == 0 || budget == 0 {
        return vec![0; capacities.len()];
    }
    if u128::from(budget) >= total {
        return capacities.to_vec();
    }

    let budget = u128::from(budget);
    let mut shares = Vec::with_capacity(capacities.len());
    let mut remainders = Vec::with_capacity(capacities.len());

    for (index, &capacity) in capacities.iter().enumerate() {
        let scaled = budget * u128::from(capacity);
        shares.push((scaled / total) as u64);
        remainders.push((scaled % total, index));
    }

    let assigned: u128 = shares.iter().map(|&s| u128::from(s)).sum();
    let leftover = (budget - assigned) as usize;

    // Largest remainder first; the stable sort keeps earlier inputs first on ties.
    remainders.sort_by(|a, b| b.0.cmp(&a.0));
    for &(_, index) in remainders.iter().take(leftover) {
        shares[index] += 1;
    }

    shares
}

/// `count` evenly spaced frame indices out of `frame_count`.
///
/// Index `i` is `floor(i * frame_count / count)`. The result starts at frame
/// 0, is strictly increasing, and every index is below `frame_count`.
/// `count` is clamped to `frame_count`.
pub fn uniform_indices(frame_count: u64, count: u64) -> Vec<u64> {
    let count = count.min(frame_count);
    if count == 0 {
        return Vec::new();
    }

    let frames = u128::from(frame_count);
    let count_wide = u128::from(count);
    (0..count_wide)
        .map(|i| (i * frames / count_wide) as u64)
        .collect()
}

/// Frames to take from one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInput {
    /// Path to the input.
    pub path: PathBuf,
    /// Frame count the plan was based on.
    pub frame_count: u64,
    /// Sorted, distinct frame indices to extract.
    pub indices: Vec<u64>,
    /// 1-based output number of this input's first image when images are
    /// numbered sequentially across all inputs.
    pub first_number: u64,
    /// File-name-safe stem, unique within the plan.
    pub stem: String,
}

impl PlannedInput {
    /// Number of images this input should produce.
    pub fn image_count(&self) -> u64 {
        self.indices.len() as u64
    }
}

/// The complete sampling decision for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPlan {
    /// Images requested by the caller.
    pub requested: u64,
    /// Sum of all input frame counts, saturating at `u64::MAX`.
    pub total_frames: u64,
    /// One entry per input, in input order.
    pub inputs: Vec<PlannedInput>,
}

impl SamplingPlan {
    /// Build a plan from probed metadata.
    pub fn build(metadata: &[MediaMetadata], budget: u64, ensure_each: bool) -> Self {
        let frame_counts: Vec<u64> = metadata.iter().map(MediaMetadata::frame_count).collect();
        let quotas = allocate(budget, &frame_counts, ensure_each);
        let stems = unique_stems(metadata.iter().map(|meta| &meta.path));

        let mut next_number = 1_u64;
        let inputs = metadata
            .iter()
            .zip(quotas)
            .zip(stems)
            .map(|((meta, quota), stem)| {
                let indices = uniform_indices(meta.frame_count(), quota);
                let first_number = next_number;
                next_number = next_number.saturating_add(indices.len() as u64);
                PlannedInput {
                    path: meta.path.clone(),
                    frame_count: meta.frame_count(),
                    indices,
                    first_number,
                    stem,
                }
            })
            .collect();

        Self {
            requested: budget,
            total_frames: frame_counts
                .iter()
                .fold(0_u64, |total, &count| total.saturating_add(count)),
            inputs,
        }
    }

    /// Images the plan will produce in total.
    pub fn planned_total(&self) -> u64 {
        self.inputs.iter().map(PlannedInput::image_count).sum()
    }

    /// Inputs that contribute at least one image.
    pub fn active_inputs(&self) -> impl Iterator<Item = &PlannedInput> {
        self.inputs.iter().filter(|input| !input.indices.is_empty())
    }
}

fn sanitize_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// Stems for output names; `%` never survives, so ffmpeg patterns stay valid.
///
/// A repeated stem gets the first free `_N` suffix, skipping names that other
/// inputs already use as their plain stem.
fn unique_stems<'a, I: Iterator<Item = &'a PathBuf>>(paths: I) -> Vec<String> {
    let bases: Vec<String> = paths
        .map(|path| {
            sanitize_stem(
                &path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let reserved: HashSet<&str> = bases.iter().map(String::as_str).collect();
    let mut counters: HashMap<&str, usize> = HashMap::new();

    bases
        .iter()
        .map(|base| {
            if taken.insert(base.clone()) {
                return base.clone();
            }
            let counter = counters.entry(base.as_str()).or_insert(1);
            loop {
                *counter += 1;
                let candidate = format!("{base}_{counter}");
                if !reserved.contains(candidate.as_str()) && taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}

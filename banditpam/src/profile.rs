/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! Optional append-only profile log.
//!
//! One keyed text line per record. The format is informational and not part
//! of the correctness contract.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Summary statistics of the per-arm sigma estimates for one phase round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaSummary {
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
    pub mean: f64,
}

impl SigmaSummary {
    /// Compute the summary by sorting a copy of the input. Returns `None` for
    /// an empty slice.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;

        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        let len = sorted.len();
        let quantile = |q: usize| sorted[((q * len) / 100).min(len - 1)];

        Some(Self {
            min: sorted[0],
            p25: quantile(25),
            p50: quantile(50),
            p75: quantile(75),
            max: sorted[len - 1],
            mean,
        })
    }
}

/// Appends per-fit records to the configured log file.
#[derive(Debug)]
pub struct ProfileWriter {
    out: BufWriter<File>,
}

impl ProfileWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Record the start of a fit.
    pub(crate) fn record_fit_start(
        &mut self,
        algorithm: &str,
        metric: &str,
        num_points: usize,
        num_medoids: usize,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "fit algorithm={algorithm} metric={metric} n={num_points} k={num_medoids}"
        )
    }

    /// Record one completed build slot.
    pub(crate) fn record_build_slot(
        &mut self,
        slot: usize,
        p: usize,
        mean_loss: f64,
        exact_arms: usize,
        sigma: &[f64],
    ) -> io::Result<()> {
        write!(
            self.out,
            "build slot={slot} p={p} mean_loss={mean_loss} exact={exact_arms}"
        )?;
        self.write_sigma(sigma)
    }

    /// Record one completed swap iteration.
    pub(crate) fn record_swap_iteration(
        &mut self,
        iteration: usize,
        p: usize,
        exact_arms: usize,
        total_loss: f64,
        sigma: &[f64],
    ) -> io::Result<()> {
        write!(
            self.out,
            "swap iter={iteration} p={p} exact={exact_arms} total_loss={total_loss}"
        )?;
        self.write_sigma(sigma)
    }

    fn write_sigma(&mut self, sigma: &[f64]) -> io::Result<()> {
        match SigmaSummary::compute(sigma) {
            Some(s) => writeln!(
                self.out,
                " sigma_min={} sigma_p25={} sigma_p50={} sigma_p75={} sigma_max={} sigma_mean={}",
                s.min, s.p25, s.p50, s.p75, s.max, s.mean
            ),
            None => writeln!(self.out),
        }
    }

    /// Flush buffered records to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::error::WriterError;
use super::mc_hit::McHitPair;
use super::tdc_edge::TdcEdgeEvent;
use super::time_window::TimeWindow;

/// Fixed binning over `[low, high)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl Axis {
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    /// Bin of a value, None for under/overflow
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        if !(self.low..self.high).contains(&value) || self.bins == 0 {
            return None;
        }
        let bin = ((value - self.low) / (self.high - self.low) * self.bins as f64) as usize;
        Some(bin.min(self.bins - 1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub title: String,
    pub axis: Axis,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram1D {
    pub fn new(title: &str, axis: Axis) -> Self {
        Self {
            title: title.to_string(),
            counts: vec![0; axis.bins],
            axis,
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, value: f64) {
        match self.axis.find_bin(value) {
            Some(bin) => self.counts[bin] += 1,
            None if value < self.axis.low => self.underflow += 1,
            None => self.overflow += 1,
        }
    }

    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Row major, `counts[y][x]`
    pub counts: Vec<Vec<u64>>,
    pub outside: u64,
}

impl Histogram2D {
    pub fn new(title: &str, x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            title: title.to_string(),
            counts: vec![vec![0; x_axis.bins]; y_axis.bins],
            x_axis,
            y_axis,
            outside: 0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x_axis.find_bin(x), self.y_axis.find_bin(y)) {
            (Some(bx), Some(by)) => self.counts[by][bx] += 1,
            _ => self.outside += 1,
        }
    }
}

/// Statistics is a side observer of the processing: histograms booked by
/// name, filled on every flushed window and written as YAML at the end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub histograms_1d: BTreeMap<String, Histogram1D>,
    pub histograms_2d: BTreeMap<String, Histogram2D>,
}

impl Statistics {
    pub fn book_1d(&mut self, name: &str, title: &str, axis: Axis) {
        self.histograms_1d
            .insert(name.to_string(), Histogram1D::new(title, axis));
    }

    pub fn book_2d(&mut self, name: &str, title: &str, x_axis: Axis, y_axis: Axis) {
        self.histograms_2d
            .insert(name.to_string(), Histogram2D::new(title, x_axis, y_axis));
    }

    /// Fill a booked histogram; unknown names are ignored
    pub fn fill_1d(&mut self, name: &str, value: f64) {
        if let Some(hist) = self.histograms_1d.get_mut(name) {
            hist.fill(value);
        }
    }

    pub fn fill_2d(&mut self, name: &str, x: f64, y: f64) {
        if let Some(hist) = self.histograms_2d.get_mut(name) {
            hist.fill(x, y);
        }
    }

    pub fn get_1d(&self, name: &str) -> Option<&Histogram1D> {
        self.histograms_1d.get(name)
    }

    pub fn get_2d(&self, name: &str) -> Option<&Histogram2D> {
        self.histograms_2d.get(name)
    }

    /// The generated and reconstructed hit histograms of the MC pipeline
    pub fn book_mc_histograms(&mut self, window_width: f64) {
        for (prefix, kind) in [("gen", "Generated"), ("rec", "Reconstructed")] {
            self.book_1d(
                &format!("{prefix}_hits_per_time_window"),
                &format!("{kind} hits in time window;Multiplicity"),
                Axis::new(101, -0.5, 500.5),
            );
            self.book_1d(
                &format!("{prefix}_hits_z_pos"),
                &format!("{kind} hits Z position;[cm]"),
                Axis::new(100, -60.0, 60.0),
            );
            self.book_2d(
                &format!("{prefix}_hits_xy_pos"),
                &format!("{kind} hits XY position;[cm];[cm]"),
                Axis::new(121, -60.5, 60.5),
                Axis::new(121, -60.5, 60.5),
            );
            self.book_1d(
                &format!("{prefix}_hit_time"),
                &format!("{kind} hit time;[ps]"),
                Axis::new(20000, 0.0, window_width),
            );
            self.book_1d(
                &format!("{prefix}_hit_eneDepos"),
                &format!("{kind} hit energy deposition;[keV]"),
                Axis::new(750, 0.0, 1500.0),
            );
        }
    }

    pub fn book_hld_histograms(&mut self) {
        self.book_1d(
            "edges_per_time_window",
            "TDC edges in time window;Multiplicity",
            Axis::new(201, -0.5, 2000.5),
        );
        self.book_1d(
            "edge_relative_time",
            "Edge time relative to the reference channel;[ns]",
            Axis::new(2000, -1000.0, 1000.0),
        );
    }

    pub fn fill_mc_window(&mut self, window: &TimeWindow<McHitPair>) {
        self.fill_1d("gen_hits_per_time_window", window.len() as f64);
        let n_reco = window.hits.iter().filter(|pair| pair.reco.is_some()).count();
        self.fill_1d("rec_hits_per_time_window", n_reco as f64);
        for pair in window.hits.iter() {
            let raw = &pair.raw;
            self.fill_1d("gen_hits_z_pos", raw.z);
            self.fill_2d("gen_hits_xy_pos", raw.x, raw.y);
            self.fill_1d("gen_hit_time", raw.time);
            self.fill_1d("gen_hit_eneDepos", raw.energy);
            if let Some(reco) = &pair.reco {
                self.fill_1d("rec_hits_z_pos", reco.z);
                self.fill_2d("rec_hits_xy_pos", reco.x, reco.y);
                self.fill_1d("rec_hit_time", reco.time);
                self.fill_1d("rec_hit_eneDepos", reco.energy);
            }
        }
    }

    pub fn fill_tdc_window(&mut self, window: &TimeWindow<TdcEdgeEvent>) {
        self.fill_1d("edges_per_time_window", window.len() as f64);
        for edge in window.hits.iter() {
            self.fill_1d("edge_relative_time", edge.relative_time);
        }
    }

    pub fn write_yaml(&self, path: &Path) -> Result<(), WriterError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        log::info!("Statistics written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_1d() {
        let mut hist = Histogram1D::new("test", Axis::new(10, 0.0, 10.0));
        hist.fill(0.0);
        hist.fill(9.999);
        hist.fill(10.0);
        hist.fill(-0.1);
        assert_eq!(hist.counts[0], 1);
        assert_eq!(hist.counts[9], 1);
        assert_eq!(hist.overflow, 1);
        assert_eq!(hist.underflow, 1);
        assert_eq!(hist.entries(), 4);
    }

    #[test]
    fn test_booked_by_name() {
        let mut stats = Statistics::default();
        stats.book_mc_histograms(20_000_000.0);
        stats.fill_1d("gen_hit_eneDepos", 511.0);
        stats.fill_2d("rec_hits_xy_pos", 0.0, 0.0);
        stats.fill_1d("not_booked", 1.0);
        assert_eq!(stats.get_1d("gen_hit_eneDepos").unwrap().entries(), 1);
        assert_eq!(stats.get_2d("rec_hits_xy_pos").unwrap().counts[60][60], 1);
        assert!(stats.get_1d("not_booked").is_none());
    }
}

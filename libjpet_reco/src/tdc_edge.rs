use serde::{Deserialize, Serialize};

/// Direction of a discriminator crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    Rising,
    Falling,
}

/// A single decoded TDC time measurement.
///
/// `full_time` is the absolute time in ns, `relative_time` the time after
/// subtracting the reference channel of the same TDC block (and, for falling
/// edges, the TOT stretcher offset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdcEdgeEvent {
    pub tdc_address: u32,
    pub channel: u8,
    pub global_channel: u32,
    pub edge: Edge,
    pub coarse: u16,
    pub fine: u32,
    pub epoch: u32,
    pub full_time: f64,
    pub relative_time: f64,
}

/// All leading and trailing edges seen in a run of consecutive hits on one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TdcChannel {
    pub global_channel: u32,
    pub leads: Vec<f64>,
    pub trails: Vec<f64>,
}

impl TdcChannel {
    pub fn new(global_channel: u32) -> Self {
        Self {
            global_channel,
            ..Default::default()
        }
    }

    pub fn add(&mut self, edge: &TdcEdgeEvent) {
        match edge.edge {
            Edge::Rising => self.leads.push(edge.relative_time),
            Edge::Falling => self.trails.push(edge.relative_time),
        }
    }
}

/// Group edges into channels, opening a new channel every time the channel
/// number changes from one edge to the next.
pub fn group_channels(edges: &[TdcEdgeEvent]) -> Vec<TdcChannel> {
    let mut channels: Vec<TdcChannel> = Vec::new();
    for edge in edges {
        match channels.last_mut() {
            Some(current) if current.global_channel == edge.global_channel => current.add(edge),
            _ => {
                let mut channel = TdcChannel::new(edge.global_channel);
                channel.add(edge);
                channels.push(channel);
            }
        }
    }
    channels
}

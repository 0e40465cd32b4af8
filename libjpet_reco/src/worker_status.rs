use super::input::InputKind;

#[derive(Debug, Clone, Default)]
pub enum BarColor {
    #[default]
    CYAN,
    MAGENTA,
    RED,
}

impl From<InputKind> for BarColor {
    fn from(kind: InputKind) -> Self {
        match kind {
            InputKind::Hld => Self::CYAN,
            InputKind::Mc => Self::MAGENTA,
        }
    }
}

/// Progress of one worker on the file it is currently processing
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub file_name: String,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, file_name: &str, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            file_name: file_name.to_string(),
            worker_id,
            color,
        }
    }
}

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "BatchSettings::default_parallel_passes")]
    pub parallel_passes: bool,
    /// Size of a dedicated rayon pool for pass refreshes. Zero uses the
    /// global pool.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "BatchSettings::default_indirect_capacity")]
    pub initial_indirect_capacity: u32,
    #[serde(default = "BatchSettings::default_instance_capacity")]
    pub initial_instance_capacity: u32,
    #[serde(default = "BatchSettings::default_object_capacity")]
    pub initial_object_capacity: u32,
    /// Fraction of dirty objects above which the whole object buffer is
    /// rewritten instead of one record per dirty object.
    #[serde(default = "BatchSettings::default_full_upload_ratio")]
    pub full_upload_ratio: f32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            parallel_passes: Self::default_parallel_passes(),
            worker_threads: 0,
            initial_indirect_capacity: Self::default_indirect_capacity(),
            initial_instance_capacity: Self::default_instance_capacity(),
            initial_object_capacity: Self::default_object_capacity(),
            full_upload_ratio: Self::default_full_upload_ratio(),
        }
    }
}

impl BatchSettings {
    pub fn load() -> Self {
        Self::load_from_path("batching.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<BatchSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded batch settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default batch settings.",
                        path, err
                    );
                    BatchSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Batch settings file {:?} not found. Using default settings.",
                    path
                );
                BatchSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default batch settings.",
                    path, err
                );
                BatchSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.initial_indirect_capacity == 0 {
            warn!("Indirect buffer capacity must be greater than zero. Using default value.");
            self.initial_indirect_capacity = Self::default_indirect_capacity();
        }

        if self.initial_instance_capacity == 0 {
            warn!("Instance buffer capacity must be greater than zero. Using default value.");
            self.initial_instance_capacity = Self::default_instance_capacity();
        }

        if self.initial_object_capacity == 0 {
            warn!("Object buffer capacity must be greater than zero. Using default value.");
            self.initial_object_capacity = Self::default_object_capacity();
        }

        if !(0.0..=1.0).contains(&self.full_upload_ratio) {
            warn!(
                "Full upload ratio {} is outside 0..=1. Using default value.",
                self.full_upload_ratio
            );
            self.full_upload_ratio = Self::default_full_upload_ratio();
        }

        self
    }

    const fn default_parallel_passes() -> bool {
        true
    }

    const fn default_indirect_capacity() -> u32 {
        256
    }

    const fn default_instance_capacity() -> u32 {
        4096
    }

    const fn default_object_capacity() -> u32 {
        4096
    }

    const fn default_full_upload_ratio() -> f32 {
        0.25
    }
}

// Aria TTS - Voice embeddings
// Each voice is a table of style vectors, one row per token-count bucket.
// The runner selects the row for a chunk by its id count minus one.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array2, ArrayBase, IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;
use parking_lot::Mutex;

/// Width of one style vector.
pub const STYLE_DIM: usize = 256;

/// Expected number of token-count buckets (one per possible id count).
pub const STYLE_ROWS: usize = 510;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Voice not found: {0}")]
    NotFound(String),
    #[error("Failed to read voice data: {0}")]
    Io(String),
    #[error("Voice data malformed: {0}")]
    Malformed(String),
}

/// A loaded voice: style rows indexed by token-count bucket.
#[derive(Debug, Clone)]
pub struct VoiceEmbeddings {
    styles: Array2<f32>,
}

impl VoiceEmbeddings {
    /// Load a single voice from a raw little-endian f32 file laid out as
    /// `[rows, 256]`.
    pub fn from_raw_file<P: AsRef<Path>>(path: P) -> Result<Self, VoiceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| VoiceError::Io(e.to_string()))?;

        let row_bytes = STYLE_DIM * std::mem::size_of::<f32>();
        if bytes.is_empty() || bytes.len() % row_bytes != 0 {
            return Err(VoiceError::Malformed(format!(
                "{}: {} bytes is not a whole number of {STYLE_DIM}-float rows",
                path.display(),
                bytes.len()
            )));
        }

        let rows = bytes.len() / row_bytes;
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let styles = Array2::from_shape_vec((rows, STYLE_DIM), floats)
            .map_err(|e| VoiceError::Malformed(e.to_string()))?;

        if rows != STYLE_ROWS {
            log::warn!(
                "Voice {} has {rows} style rows, expected {STYLE_ROWS}",
                path.display()
            );
        }

        Ok(Self { styles })
    }

    /// Load one named voice from an NPZ archive of voices. Entries are
    /// shaped `[rows, 1, 256]`.
    pub fn from_npz<P: AsRef<Path>>(path: P, name: &str) -> Result<Self, VoiceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VoiceError::Io(e.to_string()))?;
        let mut npz = NpzReader::new(file).map_err(|e| VoiceError::Io(format!("{e:?}")))?;

        // Entry names may carry the archive's ".npy" suffix.
        let arr: ArrayBase<OwnedRepr<f32>, IxDyn> = npz
            .by_name(name)
            .or_else(|_| npz.by_name(&format!("{name}.npy")))
            .map_err(|_| VoiceError::NotFound(format!("{name} in {}", path.display())))?;

        let shape = arr.shape().to_vec();
        if shape.len() != 3 || shape[1] != 1 || shape[2] != STYLE_DIM {
            return Err(VoiceError::Malformed(format!(
                "voice {name} has shape {shape:?}, expected [rows, 1, {STYLE_DIM}]"
            )));
        }

        let rows = shape[0];
        let flat: Vec<f32> = arr.iter().copied().collect();
        let styles = Array2::from_shape_vec((rows, STYLE_DIM), flat)
            .map_err(|e| VoiceError::Malformed(e.to_string()))?;

        Ok(Self { styles })
    }

    pub fn from_array(styles: Array2<f32>) -> Self {
        Self { styles }
    }

    pub fn rows(&self) -> usize {
        self.styles.nrows()
    }

    /// Style vector for a chunk of `token_count` ids. Counts beyond the
    /// table are clamped to the last row.
    pub fn style_for(&self, token_count: usize) -> Vec<f32> {
        let row = token_count
            .saturating_sub(1)
            .min(self.styles.nrows().saturating_sub(1));
        self.styles.row(row).to_vec()
    }
}

/// Memoizing voice store. Voices load once from disk and are shared as
/// immutable `Arc`s; replacing a voice swaps the `Arc` so in-flight
/// synthesis keeps the table it started with.
pub struct VoiceCache {
    voices_dir: PathBuf,
    loaded: Mutex<HashMap<String, Arc<VoiceEmbeddings>>>,
}

/// Name of the combined all-voices NPZ archive, if present.
const VOICES_ARCHIVE: &str = "voices-v1.0.bin";

impl VoiceCache {
    pub fn new(voices_dir: PathBuf) -> Self {
        Self {
            voices_dir,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    /// Fetch a voice table, loading it from disk on first use.
    ///
    /// Looks for `<dir>/<voice>.bin` (raw per-voice file), then for the
    /// voice by name inside `<dir>/voices-v1.0.bin` (NPZ archive).
    pub fn acquire(&self, voice: &str) -> Result<Arc<VoiceEmbeddings>, VoiceError> {
        if let Some(v) = self.loaded.lock().get(voice) {
            return Ok(v.clone());
        }

        let raw_path = self.voices_dir.join(format!("{voice}.bin"));
        let archive_path = self.voices_dir.join(VOICES_ARCHIVE);

        let embeddings = if raw_path.exists() {
            VoiceEmbeddings::from_raw_file(&raw_path)?
        } else if archive_path.exists() {
            VoiceEmbeddings::from_npz(&archive_path, voice)?
        } else {
            return Err(VoiceError::NotFound(format!(
                "{voice}: tried {} and {}",
                raw_path.display(),
                archive_path.display()
            )));
        };

        log::info!("Loaded voice {voice} ({} style rows)", embeddings.rows());
        let arc = Arc::new(embeddings);
        self.loaded.lock().insert(voice.to_string(), arc.clone());
        Ok(arc)
    }

    /// Insert or replace a voice table. Returns the new shared handle;
    /// existing handles keep the old table.
    pub fn replace(&self, voice: &str, embeddings: VoiceEmbeddings) -> Arc<VoiceEmbeddings> {
        let arc = Arc::new(embeddings);
        self.loaded.lock().insert(voice.to_string(), arc.clone());
        arc
    }

    pub fn is_loaded(&self, voice: &str) -> bool {
        self.loaded.lock().contains_key(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_file(ext: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join("aria-tts-tests");
        std::fs::create_dir_all(&dir).expect("failed to create temp test dir");
        dir.join(format!("voice-{nanos}.{ext}"))
    }

    #[test]
    fn raw_file_roundtrip_and_row_selection() {
        let path = unique_temp_file("bin");
        let mut bytes = Vec::new();
        for row in 0..3 {
            for _ in 0..STYLE_DIM {
                bytes.extend_from_slice(&(row as f32).to_le_bytes());
            }
        }
        std::fs::write(&path, &bytes).expect("failed to write temp voice file");

        let voice = VoiceEmbeddings::from_raw_file(&path).expect("raw voice should load");
        assert_eq!(voice.rows(), 3);
        assert_eq!(voice.style_for(1)[0], 0.0);
        assert_eq!(voice.style_for(2)[0], 1.0);
        // Out-of-range counts clamp to the last row.
        assert_eq!(voice.style_for(100)[0], 2.0);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn truncated_raw_file_is_malformed() {
        let path = unique_temp_file("bin");
        std::fs::write(&path, [0u8; 100]).expect("failed to write temp voice file");

        assert!(matches!(
            VoiceEmbeddings::from_raw_file(&path),
            Err(VoiceError::Malformed(_))
        ));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn cache_memoizes_and_replaces() {
        let cache = VoiceCache::new(std::env::temp_dir().join("aria-tts-no-such-dir"));
        assert!(matches!(
            cache.acquire("af_missing"),
            Err(VoiceError::NotFound(_))
        ));

        let first = cache.replace("af_test", VoiceEmbeddings::from_array(Array2::zeros((2, STYLE_DIM))));
        assert!(cache.is_loaded("af_test"));
        let again = cache.acquire("af_test").expect("preloaded voice");
        assert!(Arc::ptr_eq(&first, &again));

        // Replacing swaps the Arc; the old handle keeps its table.
        let second = cache.replace("af_test", VoiceEmbeddings::from_array(Array2::ones((2, STYLE_DIM))));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.style_for(1)[0], 0.0);
        assert_eq!(second.style_for(1)[0], 1.0);
    }
}

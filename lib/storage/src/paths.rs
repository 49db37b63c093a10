use std::path::{Path, PathBuf};

/// Locations of the catalog artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub embeddings: PathBuf,
    /// `.csv` or `.npy`
    pub categorical: PathBuf,
    pub numeric: PathBuf,
    pub titles: PathBuf,
    pub index: PathBuf,
}

impl DataPaths {
    /// Standard layout below a data directory:
    ///
    /// ```text
    /// processed/sentence_embeddings.npy
    /// processed/encoded_data.csv
    /// processed/numeric_scaled.npy
    /// index/title_to_index.json
    /// index/cinesim_index.bin
    /// ```
    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();
        let processed = data_dir.join("processed");
        let index = data_dir.join("index");
        Self {
            embeddings: processed.join("sentence_embeddings.npy"),
            categorical: processed.join("encoded_data.csv"),
            numeric: processed.join("numeric_scaled.npy"),
            titles: index.join("title_to_index.json"),
            index: index.join("cinesim_index.bin"),
        }
    }

    pub fn with_index<P: Into<PathBuf>>(mut self, index: P) -> Self {
        self.index = index.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = DataPaths::from_data_dir("/srv/data");
        assert_eq!(paths.categorical, PathBuf::from("/srv/data/processed/encoded_data.csv"));
        assert_eq!(paths.index, PathBuf::from("/srv/data/index/cinesim_index.bin"));
        let paths = paths.with_index("/tmp/other.bin");
        assert_eq!(paths.index, PathBuf::from("/tmp/other.bin"));
    }
}

use std::{fs::File, path::PathBuf, pin::Pin};

use futures::Stream;

use crate::parser::{RecordOutcome, Records};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to open D0010 file: {0}")]
    Open(std::io::Error),
    #[error("failed to read D0010 record: {0}")]
    Read(csv::Error),
}

/// Pipe-delimited D0010 flow file.
///
/// Yields one outcome per reading or rejected line; context-only records
/// are consumed by the parser. An I/O or decoding error ends the stream.
pub struct D0010FileSource {
    path: PathBuf,
}

impl D0010FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Stream the file's records, attributing readings to `file_id`.
    pub fn stream(
        &self,
        file_id: i64,
    ) -> Pin<Box<dyn Stream<Item = Result<RecordOutcome, SourceError>> + Send>> {
        // Blocking reads inside the stream; files are loaded one at a time,
        // so nothing else is waiting on the executor.
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path).map_err(SourceError::Open)?;

            for outcome in Records::new(file, file_id) {
                let outcome = outcome.map_err(SourceError::Read)?;
                if let RecordOutcome::Malformed(_) = &outcome {
                    metrics::counter!("d0010_malformed_lines_total").increment(1);
                }
                yield outcome;
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    #[tokio::test]
    async fn streams_readings_and_rejections_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "026|1200033197420|V|\n028|L85A 28596|C|\n030|S|BAD|1.0|||T|N|\n030|S|20160226000000|17393.0|||T|N|\n"
        )
        .unwrap();

        let source = D0010FileSource::new(file.path());
        let outcomes: Vec<_> = source.stream(3).collect().await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], Ok(RecordOutcome::Malformed(_))));
        assert!(matches!(&outcomes[1], Ok(RecordOutcome::Reading(r)) if r.file_id == 3));
    }

    #[tokio::test]
    async fn missing_file_yields_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = D0010FileSource::new(dir.path().join("gone.uff"));
        let outcomes: Vec<_> = source.stream(1).collect().await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(SourceError::Open(_))));
    }
}

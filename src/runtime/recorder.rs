//! Result recorder
//!
//! A single writer task owns the output sink. Workers and the async poller
//! render their rows and hand them over a channel, so the sink is never written
//! from two tasks at once.

use crate::core::{Column, CommandRecord, OutputTarget, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Field separator of the CSV output
pub const SEPARATOR: &str = ", ";

/// Columns actually written for a run; network byte columns are dropped unless
/// exactly one worker runs
pub fn projection(columns: &[Column], concurrency_factor: usize) -> Vec<Column> {
    columns
        .iter()
        .copied()
        .filter(|column| concurrency_factor == 1 || !column.is_network_bytes())
        .collect()
}

pub fn render_header(columns: &[Column]) -> String {
    columns
        .iter()
        .map(Column::header)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn render_line(record: &CommandRecord, columns: &[Column]) -> String {
    columns
        .iter()
        .map(|column| column.value(record))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
        .trim()
        .to_string()
}

/// `cmds_<year>_<Month>_<day>_<hour>_<minute>_<second>_output.csv`
pub fn default_file_name() -> String {
    chrono::Local::now()
        .format("cmds_%Y_%B_%-d_%-H_%-M_%-S_output.csv")
        .to_string()
}

enum Message {
    Line(String),
    Close,
}

/// Cloneable handle used to submit rows
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<Message>,
    columns: Arc<[Column]>,
}

impl RecorderHandle {
    /// Render and enqueue one row
    pub fn record(&self, record: &CommandRecord) {
        let line = render_line(record, &self.columns);
        if self.tx.send(Message::Line(line)).is_err() {
            debug!("Recorder closed, dropping row for seq {}", record.seq);
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// The writer task; `finish` flushes and returns the number of rows written
pub struct ResultRecorder {
    tx: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<Result<u64>>,
}

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

impl ResultRecorder {
    /// Open the sink, write the header and start the writer task
    pub async fn start(
        target: &OutputTarget,
        echo: bool,
        columns: &[Column],
        concurrency_factor: usize,
    ) -> Result<(Self, RecorderHandle)> {
        let sink: Sink = match target {
            OutputTarget::Stdout => Box::new(tokio::io::stdout()),
            OutputTarget::File(path) => Box::new(open_append(path).await?),
        };
        // echoing a stdout sink would print every row twice
        let echo = echo && matches!(target, OutputTarget::File(_));
        Self::with_sink(sink, echo, columns, concurrency_factor).await
    }

    /// Start the writer over an arbitrary sink
    pub async fn with_sink(
        mut sink: Sink,
        echo: bool,
        columns: &[Column],
        concurrency_factor: usize,
    ) -> Result<(Self, RecorderHandle)> {
        let columns: Arc<[Column]> = projection(columns, concurrency_factor).into();
        let header = render_header(&columns);
        sink.write_all(header.as_bytes()).await?;
        sink.write_all(b"\n").await?;
        if echo {
            println!("{header}");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_rows(sink, rx, echo));
        let handle = RecorderHandle {
            tx: tx.clone(),
            columns,
        };
        Ok((Self { tx, writer }, handle))
    }

    /// Stop accepting rows, flush the sink and return how many rows were written
    pub async fn finish(self) -> Result<u64> {
        let _ = self.tx.send(Message::Close);
        self.writer.await?
    }
}

async fn open_append(path: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    info!("Writing output to {}", path.display());
    Ok(file)
}

async fn write_rows(
    mut sink: Sink,
    mut rx: mpsc::UnboundedReceiver<Message>,
    echo: bool,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(message) = rx.recv().await {
        match message {
            Message::Line(line) => {
                sink.write_all(line.as_bytes()).await?;
                sink.write_all(b"\n").await?;
                if echo {
                    println!("{line}");
                }
                written += 1;
            }
            Message::Close => break,
        }
    }
    sink.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScheduledCommand;

    const COLUMNS: &[Column] = &[
        Column::Batch,
        Column::Seq,
        Column::ContainerName,
        Column::DockerCmd,
        Column::ElapsedTime,
        Column::Parameter,
        Column::BytesReceived,
        Column::BytesTransmitted,
    ];

    fn record(seq: u64, verb: &str) -> CommandRecord {
        let cmd = ScheduledCommand {
            batch: 0,
            seq,
            resource: "contA".to_string(),
            verb: verb.to_string(),
            parameter: None,
            owner: None,
            turn: None,
        };
        let mut record = CommandRecord::started(&cmd, 0);
        record.elapsed_ms = 15;
        record.bytes_received = Some(10);
        record.bytes_transmitted = Some(20);
        record
    }

    #[test]
    fn test_single_worker_keeps_network_columns() {
        let header = render_header(&projection(COLUMNS, 1));
        assert!(header.contains("BytesReceived"));
        assert!(header.contains("BytesTransmitted"));
    }

    #[test]
    fn test_concurrent_workers_drop_network_columns() {
        let columns = projection(COLUMNS, 8);
        let header = render_header(&columns);
        assert!(!header.contains("BytesReceived"));
        assert!(!header.contains("BytesTransmitted"));
        assert_eq!(columns.len(), COLUMNS.len() - 2);
        assert_eq!(render_line(&record(1, "create"), &columns), "0, 1, contA, create, 15,");
    }

    #[test]
    fn test_render_line_follows_column_order() {
        let line = render_line(&record(3, "run"), &projection(COLUMNS, 1));
        assert_eq!(line, "0, 3, contA, run, 15, , 10, 20");
    }

    #[test]
    fn test_default_file_name_shape() {
        let name = default_file_name();
        assert!(name.starts_with("cmds_"));
        assert!(name.ends_with("_output.csv"));
    }

    #[tokio::test]
    async fn test_file_sink_appends_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("run.csv");
        let target = OutputTarget::File(path.clone());

        let (recorder, handle) = ResultRecorder::start(&target, false, COLUMNS, 4)
            .await
            .unwrap();
        let workers: Vec<_> = (0..4)
            .map(|seq| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.record(&record(seq, "create")) })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }
        assert_eq!(recorder.finish().await.unwrap(), 4);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Batch, Seq, ContainerName, DockerCmd, ElapsedTime, Parameter");
        assert!(lines[1..].iter().all(|l| l.contains("contA, create")));

        // a second run appends instead of truncating
        let (recorder, _handle) = ResultRecorder::start(&target, false, COLUMNS, 4)
            .await
            .unwrap();
        assert_eq!(recorder.finish().await.unwrap(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 6);
    }

    #[tokio::test]
    async fn test_rows_after_finish_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::File(dir.path().join("late.csv"));
        let (recorder, handle) = ResultRecorder::start(&target, false, COLUMNS, 1)
            .await
            .unwrap();
        recorder.finish().await.unwrap();
        handle.record(&record(9, "rm"));
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Writes each item of a batch as one JSON document per line.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::future::{Ready, ready};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::{BoxError, Service};

type Writer = Box<dyn Write + Send>;

#[derive(Clone)]
pub struct JsonLinesExporter {
    writer: Arc<Mutex<Writer>>,
}

impl JsonLinesExporter {
    /// Append to the file at `path`, creating it when missing.
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(Box::new(BufWriter::new(file))))
    }

    pub fn to_stdout() -> Self {
        Self::from_writer(Box::new(io::stdout()))
    }

    pub fn from_writer(writer: Writer) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    fn write_batch<T: Serialize>(&self, batch: &[T]) -> Result<(), BoxError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BoxError::from("json lines writer lock poisoned"))?;
        for item in batch {
            serde_json::to_writer(&mut *writer, item)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl<T: Serialize> Service<Vec<T>> for JsonLinesExporter {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, batch: Vec<T>) -> Self::Future {
        ready(self.write_batch(&batch))
    }
}

use super::{Backend, BackendError};
use crate::error::StoreError;
use crate::models::item::Record;

/// In-process backend. Records live as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Vec<Record>,
    open: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::Closed)
        }
    }
}

impl Backend for MemoryBackend {
    fn open(&mut self) -> Result<(), BackendError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn snapshot(&self) -> Result<Vec<Record>, BackendError> {
        self.ensure_open()?;
        Ok(self.records.clone())
    }

    fn transact<R>(
        &mut self,
        apply: impl FnOnce(&mut Vec<Record>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.ensure_open()?;
        let mut working = self.records.clone();
        let out = apply(&mut working)?;
        self.records = working;
        Ok(out)
    }
}

//! Chunk-oriented processing: read items one by one, process them, and hand
//! each chunk of results to a writer in one call.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::modules::batch::execution::StepExecution;
use crate::modules::batch::parameters::JobParameters;
use crate::modules::batch::step::Step;

/// Source of items. `Ok(None)` ends the input.
#[async_trait]
pub trait ItemReader<T: Send>: Send {
    async fn read(&mut self) -> Result<Option<T>>;
}

/// Transforms one item. `Ok(None)` filters the item out of the chunk.
#[async_trait]
pub trait ItemProcessor<I: Send, O: Send>: Send + Sync {
    async fn process(&self, item: I) -> Result<Option<O>>;
}

/// Persists one chunk of processed items
#[async_trait]
pub trait ItemWriter<O: Send>: Send + Sync {
    async fn write(&self, items: Vec<O>) -> Result<()>;
}

/// Reader over items already in memory
pub struct ListItemReader<T> {
    items: VecDeque<T>,
}

impl<T> ListItemReader<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<T: Send> ItemReader<T> for ListItemReader<T> {
    async fn read(&mut self) -> Result<Option<T>> {
        Ok(self.items.pop_front())
    }
}

/// Drive `reader -> processor -> writer` until the reader is exhausted.
///
/// Every chunk that reaches the writer (or is entirely filtered) counts one
/// commit. The first error from any component counts a rollback and ends
/// the loop.
pub async fn run_chunks<I, O, R, P, W>(
    reader: &mut R,
    processor: &P,
    writer: &W,
    chunk_size: usize,
    execution: &mut StepExecution,
) -> Result<()>
where
    I: Send,
    O: Send,
    R: ItemReader<I> + ?Sized,
    P: ItemProcessor<I, O> + ?Sized,
    W: ItemWriter<O> + ?Sized,
{
    let chunk_size = chunk_size.max(1);

    loop {
        let mut items = Vec::with_capacity(chunk_size);
        let mut exhausted = false;

        while items.len() < chunk_size {
            match reader.read().await {
                Ok(Some(item)) => {
                    execution.read_count += 1;
                    items.push(item);
                }
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(e) => {
                    execution.rollback_count += 1;
                    return Err(e);
                }
            }
        }

        if items.is_empty() {
            break;
        }

        let mut outputs = Vec::with_capacity(items.len());
        for item in items {
            match processor.process(item).await {
                Ok(Some(output)) => outputs.push(output),
                Ok(None) => execution.filter_count += 1,
                Err(e) => {
                    execution.rollback_count += 1;
                    return Err(e);
                }
            }
        }

        if !outputs.is_empty() {
            let written = outputs.len() as u64;
            if let Err(e) = writer.write(outputs).await {
                execution.rollback_count += 1;
                return Err(e);
            }
            execution.write_count += written;
        }
        execution.commit_count += 1;

        if exhausted {
            break;
        }
    }

    Ok(())
}

/// Reader, processor and writer for one step run
pub struct ChunkComponents<I: Send, O: Send> {
    pub reader: Box<dyn ItemReader<I>>,
    pub processor: Box<dyn ItemProcessor<I, O>>,
    pub writer: Box<dyn ItemWriter<O>>,
}

impl<I: Send, O: Send> ChunkComponents<I, O> {
    pub fn new(
        reader: impl ItemReader<I> + 'static,
        processor: impl ItemProcessor<I, O> + 'static,
        writer: impl ItemWriter<O> + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            processor: Box::new(processor),
            writer: Box::new(writer),
        }
    }
}

type OpenComponents<I, O> =
    dyn Fn(&JobParameters) -> Result<ChunkComponents<I, O>> + Send + Sync;

/// Step that builds fresh components from the job parameters on every run
/// and processes them in chunks of `chunk_size`.
pub struct ChunkStep<I: Send, O: Send> {
    name: String,
    chunk_size: usize,
    open: Box<OpenComponents<I, O>>,
}

impl<I: Send + 'static, O: Send + 'static> ChunkStep<I, O> {
    pub fn new<F>(name: impl Into<String>, chunk_size: usize, open: F) -> Self
    where
        F: Fn(&JobParameters) -> Result<ChunkComponents<I, O>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            chunk_size,
            open: Box::new(open),
        }
    }
}

#[async_trait]
impl<I: Send + 'static, O: Send + 'static> Step for ChunkStep<I, O> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, params: &JobParameters, execution: &mut StepExecution) -> Result<()> {
        let ChunkComponents {
            mut reader,
            processor,
            writer,
        } = (self.open)(params)?;

        run_chunks(
            reader.as_mut(),
            processor.as_ref(),
            writer.as_ref(),
            self.chunk_size,
            execution,
        )
        .await
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;
use crate::features::activities::models::MemberActivityType;
use crate::features::deadletters::models::{
    CategorizedDeadLetter, DeadLetterSource, ListenerDeadLetter,
};
use crate::features::deadletters::queue::ActivityDeadLetterQueue;
use crate::features::deadletters::stores::{CategorizedDeadLetterStore, ListenerDeadLetterStore};
use crate::modules::batch::ItemReader;

/// Table of rows waiting to be restored
#[async_trait]
pub trait PendingSource<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, limit: i64, exclude_ids: &[Uuid]) -> Result<Vec<T>>;

    fn id_of(&self, item: &T) -> Uuid;
}

pub struct CategorizedSource {
    pub store: Arc<dyn CategorizedDeadLetterStore>,
    pub source: DeadLetterSource,
}

#[async_trait]
impl PendingSource<CategorizedDeadLetter> for CategorizedSource {
    fn name(&self) -> &str {
        self.source.table()
    }

    async fn fetch(&self, limit: i64, exclude_ids: &[Uuid]) -> Result<Vec<CategorizedDeadLetter>> {
        self.store.find_pending(self.source, limit, exclude_ids).await
    }

    fn id_of(&self, item: &CategorizedDeadLetter) -> Uuid {
        item.id
    }
}

pub struct ListenerSource {
    pub store: Arc<dyn ListenerDeadLetterStore>,
}

#[async_trait]
impl PendingSource<ListenerDeadLetter> for ListenerSource {
    fn name(&self) -> &str {
        "listener_dead_letters"
    }

    async fn fetch(&self, limit: i64, exclude_ids: &[Uuid]) -> Result<Vec<ListenerDeadLetter>> {
        self.store.find_pending(limit, exclude_ids).await
    }

    fn id_of(&self, item: &ListenerDeadLetter) -> Uuid {
        item.id
    }
}

/// Reads pending rows a page at a time; each page is one item.
///
/// Ids already returned are excluded from later pages, so rows the writer
/// leaves pending are not read twice. A page shorter than `page_size` ends
/// the run.
pub struct PendingPageReader<T> {
    source: Box<dyn PendingSource<T>>,
    page_size: i64,
    returned: Vec<Uuid>,
    exhausted: bool,
}

impl<T> PendingPageReader<T> {
    pub fn new(source: impl PendingSource<T> + 'static, page_size: i64) -> Self {
        Self {
            source: Box::new(source),
            page_size,
            returned: Vec::new(),
            exhausted: false,
        }
    }
}

#[async_trait]
impl<T: Send> ItemReader<Vec<T>> for PendingPageReader<T> {
    async fn read(&mut self) -> Result<Option<Vec<T>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.source.fetch(self.page_size, &self.returned).await?;
        if page.is_empty() {
            tracing::info!("No more {} rows to process", self.source.name());
            self.exhausted = true;
            return Ok(None);
        }

        tracing::info!("Fetched {} {} rows", page.len(), self.source.name());
        if (page.len() as i64) < self.page_size {
            self.exhausted = true;
        }
        let ids: Vec<Uuid> = page.iter().map(|item| self.source.id_of(item)).collect();
        self.returned.extend(ids);
        Ok(Some(page))
    }
}

/// Pops one batch from each per-type Redis list, in declaration order,
/// returning only non-empty batches
pub struct ActivityQueueReader {
    queue: Arc<dyn ActivityDeadLetterQueue>,
    batch_size: usize,
    next_type: usize,
}

impl ActivityQueueReader {
    pub fn new(queue: Arc<dyn ActivityDeadLetterQueue>, batch_size: usize) -> Self {
        Self {
            queue,
            batch_size,
            next_type: 0,
        }
    }
}

#[async_trait]
impl ItemReader<Vec<MemberActivityMessage>> for ActivityQueueReader {
    async fn read(&mut self) -> Result<Option<Vec<MemberActivityMessage>>> {
        while let Some(activity_type) = MemberActivityType::ALL.get(self.next_type).copied() {
            self.next_type += 1;

            let messages = self.queue.pop_front(activity_type, self.batch_size).await?;
            if !messages.is_empty() {
                tracing::info!(
                    "Fetched {} messages from Redis for activityType: {}",
                    messages.len(),
                    activity_type
                );
                return Ok(Some(messages));
            }
            tracing::debug!("No messages found for activityType: {}", activity_type);
        }

        tracing::info!("Finished reading all messages from Redis DLQ");
        Ok(None)
    }
}

/// Drains the listener Redis list; a short batch ends the run
pub struct ListenerQueueReader {
    queue: Arc<dyn ActivityDeadLetterQueue>,
    batch_size: usize,
    exhausted: bool,
}

impl ListenerQueueReader {
    pub fn new(queue: Arc<dyn ActivityDeadLetterQueue>, batch_size: usize) -> Self {
        Self {
            queue,
            batch_size,
            exhausted: false,
        }
    }
}

#[async_trait]
impl ItemReader<Vec<MemberActivityMessage>> for ListenerQueueReader {
    async fn read(&mut self) -> Result<Option<Vec<MemberActivityMessage>>> {
        if self.exhausted {
            return Ok(None);
        }

        let messages = self.queue.pop_front_listener(self.batch_size).await?;
        if messages.is_empty() {
            tracing::info!("No more messages in Redis dead letter queue");
            self.exhausted = true;
            return Ok(None);
        }

        tracing::info!(
            "Fetched {} messages from Redis dead letter queue",
            messages.len()
        );
        if messages.len() < self.batch_size {
            self.exhausted = true;
        }
        Ok(Some(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::activities::models::ActivityCategory;
    use crate::features::deadletters::jobs::test_support::message;
    use crate::features::deadletters::queue::InMemoryActivityDeadLetterQueue;
    use crate::features::deadletters::stores::InMemoryCategorizedDeadLetterStore;

    #[tokio::test]
    async fn test_page_reader_skips_returned_rows() {
        let store = Arc::new(InMemoryCategorizedDeadLetterStore::new());
        for _ in 0..3 {
            store.seed(
                DeadLetterSource::Feign,
                CategorizedDeadLetter::new(ActivityCategory::Post, "{}", None),
            );
        }
        let mut reader = PendingPageReader::new(
            CategorizedSource {
                store: store.clone(),
                source: DeadLetterSource::Feign,
            },
            2,
        );

        // Nothing is marked completed, yet each row is returned only once
        let first = reader.read().await.unwrap().unwrap();
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(!first.iter().any(|a| a.id == second[0].id));
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_reader_stops_on_empty_table() {
        let mut reader = PendingPageReader::new(
            CategorizedSource {
                store: Arc::new(InMemoryCategorizedDeadLetterStore::new()),
                source: DeadLetterSource::KafkaPublisher,
            },
            50,
        );
        assert!(reader.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activity_queue_reader_visits_each_type_once() {
        let queue = Arc::new(InMemoryActivityDeadLetterQueue::new());
        let messages: Vec<_> = (0..4)
            .map(|i| message(&format!("c{}", i), MemberActivityType::CommentCreate))
            .chain(std::iter::once(message("p", MemberActivityType::PostCreate)))
            .collect();
        queue.push_back_all(&messages).await.unwrap();

        let mut reader = ActivityQueueReader::new(queue.clone(), 3);

        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(first[0].key, "p");
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(second.len(), 3);
        assert!(reader.read().await.unwrap().is_none());

        // Leftovers wait for the next run
        assert_eq!(
            queue
                .pop_front(MemberActivityType::CommentCreate, 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_listener_queue_reader_stops_after_short_batch() {
        let queue = Arc::new(InMemoryActivityDeadLetterQueue::new());
        queue
            .push_back_listener(&[
                message("a", MemberActivityType::PostRead),
                message("b", MemberActivityType::PostRead),
                message("c", MemberActivityType::PostRead),
            ])
            .await
            .unwrap();

        let mut reader = ListenerQueueReader::new(queue, 2);

        assert_eq!(reader.read().await.unwrap().unwrap().len(), 2);
        assert_eq!(reader.read().await.unwrap().unwrap().len(), 1);
        assert!(reader.read().await.unwrap().is_none());
    }
}

//! Topic registry
//!
//! Name to `Topic` map owned by the manager actor. Topics are created on
//! first use and only removed by `delete`. The dispatcher of a deleted topic
//! is kept until it finishes, so a topic re-created under that name can wait
//! for it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::broker::counters::Counters;
use crate::broker::queue::QueueId;
use crate::broker::topic::Topic;

#[derive(Debug)]
pub struct Registry {
    topics: HashMap<String, Topic>,
    retired: HashMap<String, JoinHandle<()>>,
    topic_capacity: usize,
    counters: Arc<Counters>,
}

impl Registry {
    pub fn new(topic_capacity: usize, counters: Arc<Counters>) -> Self {
        Self {
            topics: HashMap::new(),
            retired: HashMap::new(),
            topic_capacity,
            counters,
        }
    }

    pub fn get_or_create(&mut self, name: &str) -> &mut Topic {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| {
                Topic::new(name, self.topic_capacity, self.counters.clone())
                    .after(self.retired.remove(name))
            })
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Topic> {
        self.topics.get_mut(name)
    }

    /// Close and remove a topic. `None` when there was no such topic.
    pub fn delete(&mut self, name: &str) -> Option<Vec<QueueId>> {
        let retired = self.topics.remove(name)?.close();
        self.retired.retain(|_, dispatcher| !dispatcher.is_finished());
        if let Some(dispatcher) = retired.dispatcher {
            self.retired.insert(name.to_string(), dispatcher);
        }
        Some(retired.released)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

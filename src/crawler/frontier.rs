//! Crawl frontier: discovery, deduplication and visit order
//!
//! Every URL moves through `pending → in-flight → done` at most once. The
//! `discovered` set only grows, so a URL that was ever seen is never queued
//! again, even after it has been completed.

use crate::CrawlError;
use std::collections::{HashSet, VecDeque};

/// Serializable copy of the frontier used by checkpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierSnapshot {
    /// URLs still to process, in dispatch order (in-flight URLs first)
    pub pending: Vec<String>,

    /// URLs whose processing finished
    pub done: Vec<String>,
}

/// Frontier of the crawl
///
/// Owned by a single coordinating task; workers never touch it directly.
#[derive(Debug, Default)]
pub struct Frontier {
    discovered: HashSet<String>,
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
    done: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds start URLs that have not been discovered yet
    ///
    /// Idempotent; returns the number of URLs actually added.
    pub fn seed<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enqueue(urls)
    }

    /// Queues the URLs of a batch that have never been discovered
    ///
    /// Duplicates inside the batch are queued once. Returns the number added.
    pub fn enqueue<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;

        for url in urls {
            let url = url.into();
            if self.discovered.insert(url.clone()) {
                self.pending.push_back(url);
                added += 1;
            }
        }

        if added > 0 {
            tracing::trace!("Enqueued {} new URLs, {} pending", added, self.pending.len());
        }

        added
    }

    /// Takes the next URL to process
    ///
    /// Order is FIFO: URLs are dispatched in the order they were discovered.
    /// The URL stays in flight until [`Frontier::complete`] is called.
    pub fn next(&mut self) -> Result<String, CrawlError> {
        let url = self.pending.pop_front().ok_or(CrawlError::FrontierEmpty)?;
        self.in_flight.insert(url.clone());
        Ok(url)
    }

    /// Marks a URL as done
    ///
    /// Idempotent: completing a done URL is a no-op. A URL that is still
    /// pending is taken out of the queue.
    pub fn complete(&mut self, url: &str) {
        if self.done.contains(url) {
            return;
        }

        if !self.in_flight.remove(url) {
            if let Some(position) = self.pending.iter().position(|queued| queued == url) {
                self.pending.remove(position);
            }
        }

        self.discovered.insert(url.to_string());
        self.done.insert(url.to_string());
    }

    /// True iff nothing is waiting to be dispatched
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True iff nothing is pending or in flight
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn done_len(&self) -> usize {
        self.done.len()
    }

    pub fn discovered_len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_discovered(&self, url: &str) -> bool {
        self.discovered.contains(url)
    }

    pub fn is_done(&self, url: &str) -> bool {
        self.done.contains(url)
    }

    /// Copies the frontier for a checkpoint
    ///
    /// In-flight URLs are written back as pending so an interrupted crawl
    /// processes them again on resume.
    pub fn snapshot(&self) -> FrontierSnapshot {
        let mut in_flight: Vec<String> = self.in_flight.iter().cloned().collect();
        in_flight.sort();

        let mut done: Vec<String> = self.done.iter().cloned().collect();
        done.sort();

        FrontierSnapshot {
            pending: in_flight
                .into_iter()
                .chain(self.pending.iter().cloned())
                .collect(),
            done,
        }
    }

    /// Rebuilds a frontier from a checkpoint snapshot
    ///
    /// A URL listed as both pending and done is treated as done.
    pub fn restore(snapshot: FrontierSnapshot) -> Self {
        let mut frontier = Self::new();

        for url in snapshot.done {
            frontier.discovered.insert(url.clone());
            frontier.done.insert(url);
        }

        frontier.enqueue(snapshot.pending);
        frontier
    }

    /// Checks the structural invariants of the frontier
    ///
    /// - pending, in-flight and done are pairwise disjoint
    /// - every pending, in-flight or done URL is discovered
    /// - the pending queue holds no duplicates
    pub fn verify(&self) -> Result<(), CrawlError> {
        let mut seen = HashSet::with_capacity(self.pending.len());

        for url in &self.pending {
            if !seen.insert(url.as_str()) {
                return Err(CrawlError::FrontierInvariant(format!(
                    "{} is queued twice",
                    url
                )));
            }
            if self.done.contains(url) {
                return Err(CrawlError::FrontierInvariant(format!(
                    "{} is both pending and done",
                    url
                )));
            }
            if self.in_flight.contains(url) {
                return Err(CrawlError::FrontierInvariant(format!(
                    "{} is both pending and in flight",
                    url
                )));
            }
        }

        if let Some(url) = self.in_flight.iter().find(|url| self.done.contains(*url)) {
            return Err(CrawlError::FrontierInvariant(format!(
                "{} is both in flight and done",
                url
            )));
        }

        let tracked = self
            .pending
            .iter()
            .chain(self.in_flight.iter())
            .chain(self.done.iter());
        for url in tracked {
            if !self.discovered.contains(url) {
                return Err(CrawlError::FrontierInvariant(format!(
                    "{} is tracked but was never discovered",
                    url
                )));
            }
        }

        Ok(())
    }
}

//! In-memory edge store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::follow::{EdgeStore, FollowEdge};
use crate::id::ObjectId;

#[derive(Default)]
struct Edges {
    by_pair: HashMap<(ObjectId, ObjectId), (u64, FollowEdge)>,
    seq: u64,
}

impl Edges {
    fn page<F>(&self, filter: F, skip: u64, limit: u64) -> (Vec<FollowEdge>, u64)
    where
        F: Fn(&FollowEdge) -> bool,
    {
        let mut found: Vec<&(u64, FollowEdge)> = self.by_pair.values().filter(|(_, edge)| filter(edge)).collect();
        // newest first; insertion sequence breaks ties within the same instant.
        found.sort_by(|(seq_a, a), (seq_b, b)| b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a)));

        let total = found.len() as u64;
        let page = found
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(|(_, edge)| edge.clone())
            .collect();

        (page, total)
    }
}

/// [`EdgeStore`] kept in process memory, keyed by the pair.
#[derive(Default)]
pub struct MemoryEdgeStore {
    edges: RwLock<Edges>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn create(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>> {
        let mut edges = self.edges.write().await;
        let key = (*follower_id, *following_id);

        if edges.by_pair.contains_key(&key) {
            return Ok(None);
        }

        edges.seq += 1;
        let seq = edges.seq;
        let edge = FollowEdge::new(*follower_id, *following_id);
        edges.by_pair.insert(key, (seq, edge.clone()));

        Ok(Some(edge))
    }

    async fn delete(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<bool> {
        Ok(self
            .edges
            .write()
            .await
            .by_pair
            .remove(&(*follower_id, *following_id))
            .is_some())
    }

    async fn get(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>> {
        Ok(self
            .edges
            .read()
            .await
            .by_pair
            .get(&(*follower_id, *following_id))
            .map(|(_, edge)| edge.clone()))
    }

    async fn list_by_following(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)> {
        Ok(self
            .edges
            .read()
            .await
            .page(|edge| edge.following_id == *user_id, skip, limit))
    }

    async fn list_by_follower(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)> {
        Ok(self
            .edges
            .read()
            .await
            .page(|edge| edge.follower_id == *user_id, skip, limit))
    }

    async fn counts(&self, user_id: &ObjectId) -> Result<(u64, u64)> {
        let edges = self.edges.read().await;
        let (followers, following) = edges.by_pair.keys().fold((0, 0), |(followers, following), (from, to)| {
            (
                followers + u64::from(to == user_id),
                following + u64::from(from == user_id),
            )
        });

        Ok((followers, following))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_unique_per_pair() {
        let store = MemoryEdgeStore::new();
        let (a, b) = (ObjectId::new(), ObjectId::new());

        assert!(store.create(&a, &b).await.unwrap().is_some());
        assert!(store.create(&a, &b).await.unwrap().is_none());
        // reverse direction is another edge.
        assert!(store.create(&b, &a).await.unwrap().is_some());

        assert_eq!(store.counts(&a).await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryEdgeStore::new();
        let (a, b) = (ObjectId::new(), ObjectId::new());

        assert!(!store.delete(&a, &b).await.unwrap());
        store.create(&a, &b).await.unwrap();
        assert!(store.get(&a, &b).await.unwrap().is_some());
        assert!(store.delete(&a, &b).await.unwrap());
        assert!(store.get(&a, &b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_newest_first() {
        let store = MemoryEdgeStore::new();
        let target = ObjectId::new();
        let followers: Vec<ObjectId> = (0..5).map(|_| ObjectId::new()).collect();
        for follower in &followers {
            store.create(follower, &target).await.unwrap();
        }

        let (page, total) = store.list_by_following(&target, 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(|e| e.follower_id).collect::<Vec<_>>(),
            vec![followers[3], followers[2]]
        );

        let (page, total) = store.list_by_follower(&followers[0], 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].following_id, target);
    }
}
